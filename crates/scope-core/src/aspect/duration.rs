use std::fmt;
use std::str::FromStr;

// ---------------------------------------------------------------------------
// ISO-8601 durations
// ---------------------------------------------------------------------------

/// An ISO-8601 duration: `PnYnMnDTnHnMnS` or the week form `PnW`.
///
/// Components are non-negative integers except seconds, which may carry a
/// decimal fraction. At least one component must be present, and a `T` must
/// be followed by at least one time component. The week form cannot be
/// combined with other components.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct IsoDuration {
    pub years: u64,
    pub months: u64,
    pub weeks: u64,
    pub days: u64,
    pub hours: u64,
    pub minutes: u64,
    pub seconds: f64,
}

/// Malformed ISO-8601 duration text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid ISO-8601 duration: {text:?}")]
pub struct IsoDurationError {
    pub text: String,
}

impl FromStr for IsoDuration {
    type Err = IsoDurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse(s).ok_or_else(|| IsoDurationError {
            text: s.to_string(),
        })
    }
}

fn parse(s: &str) -> Option<IsoDuration> {
    let rest = s.strip_prefix(['P', 'p'])?;
    if rest.is_empty() {
        return None;
    }

    // Week form: PnW, exclusive of everything else.
    if rest.ends_with(['W', 'w']) {
        let digits = &rest[..rest.len() - 1];
        let weeks = parse_integer(digits)?;
        return Some(IsoDuration {
            weeks,
            ..IsoDuration::default()
        });
    }

    let mut out = IsoDuration::default();
    let (date_part, time_part) = match rest.split_once(['T', 't']) {
        Some((_, time)) if time.is_empty() => return None,
        Some((date, time)) => (date, Some(time)),
        None => (rest, None),
    };

    let mut saw_component = false;

    // Date designators, in order: Y, M, D.
    let mut cursor = date_part;
    for designator in ['Y', 'M', 'D'] {
        let Some((value, tail)) = take_component(cursor, designator) else {
            continue;
        };
        match designator {
            'Y' => out.years = parse_integer(value)?,
            'M' => out.months = parse_integer(value)?,
            _ => out.days = parse_integer(value)?,
        }
        saw_component = true;
        cursor = tail;
    }
    if !cursor.is_empty() {
        return None;
    }

    // Time designators, in order: H, M, S.
    if let Some(time) = time_part {
        let mut cursor = time;
        for designator in ['H', 'M', 'S'] {
            let Some((value, tail)) = take_component(cursor, designator) else {
                continue;
            };
            match designator {
                'H' => out.hours = parse_integer(value)?,
                'M' => out.minutes = parse_integer(value)?,
                _ => out.seconds = parse_seconds(value)?,
            }
            saw_component = true;
            cursor = tail;
        }
        if !cursor.is_empty() {
            return None;
        }
    }

    saw_component.then_some(out)
}

/// Split `nX…` off the front of `input` when its designator is `X`
/// (case-insensitive). Returns the digit run and the remainder.
fn take_component(input: &str, designator: char) -> Option<(&str, &str)> {
    let run_len = input
        .find(|c: char| !c.is_ascii_digit() && c != '.')
        .unwrap_or(input.len());
    if run_len == 0 {
        return None;
    }
    let next = input[run_len..].chars().next()?;
    if !next.eq_ignore_ascii_case(&designator) {
        return None;
    }
    Some((&input[..run_len], &input[run_len + next.len_utf8()..]))
}

fn parse_integer(digits: &str) -> Option<u64> {
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

fn parse_seconds(text: &str) -> Option<f64> {
    if text.is_empty() {
        return None;
    }
    let mut parts = text.splitn(2, '.');
    let whole = parts.next()?;
    if whole.is_empty() || !whole.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if let Some(frac) = parts.next()
        && (frac.is_empty() || !frac.bytes().all(|b| b.is_ascii_digit()))
    {
        return None;
    }
    let value: f64 = text.parse().ok()?;
    value.is_finite().then_some(value)
}

impl fmt::Display for IsoDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.weeks > 0 {
            return write!(f, "P{}W", self.weeks);
        }
        write!(f, "P")?;
        if self.years > 0 {
            write!(f, "{}Y", self.years)?;
        }
        if self.months > 0 {
            write!(f, "{}M", self.months)?;
        }
        if self.days > 0 {
            write!(f, "{}D", self.days)?;
        }
        if self.hours > 0 || self.minutes > 0 || self.seconds > 0.0 {
            write!(f, "T")?;
            if self.hours > 0 {
                write!(f, "{}H", self.hours)?;
            }
            if self.minutes > 0 {
                write!(f, "{}M", self.minutes)?;
            }
            if self.seconds > 0.0 {
                write!(f, "{}S", self.seconds)?;
            }
        } else if self.years == 0 && self.months == 0 && self.days == 0 {
            write!(f, "T0S")?;
        }
        Ok(())
    }
}
