use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, fmt};

use scope_config::{LogFormat, LoggingConfig};

// ---------------------------------------------------------------------------
// Tracing bootstrap
// ---------------------------------------------------------------------------

/// Install the global tracing subscriber from the `[logging]` section.
///
/// Returns the appender guard when a log file is configured; the caller
/// keeps it alive for the process lifetime so buffered lines flush on exit.
pub fn init_tracing(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let filter = build_filter(config)?;

    match &config.file {
        None => {
            install(filter, config.format, std::io::stderr, true);
            Ok(None)
        }
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("creating log directory {}", parent.display()))?;
            }
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("opening log file {}", path.display()))?;
            let (writer, guard) = tracing_appender::non_blocking(file);
            install(filter, config.format, writer, false);
            Ok(Some(guard))
        }
    }
}

/// Global level plus per-module overrides, e.g. `info` with
/// `scope_sync::orchestrator=debug`.
fn build_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    let mut directives = config.level.clone();
    for (module, level) in &config.modules {
        directives.push_str(&format!(",{module}={level}"));
    }
    directives
        .parse::<EnvFilter>()
        .with_context(|| format!("invalid logging filter {directives:?}"))
}

fn install<W>(filter: EnvFilter, format: LogFormat, writer: W, ansi: bool)
where
    W: for<'a> fmt::MakeWriter<'a> + Send + Sync + 'static,
{
    let layer = match format {
        LogFormat::Plain => fmt::layer()
            .with_writer(writer)
            .with_ansi(ansi)
            .with_target(false)
            .boxed(),
        LogFormat::Json => fmt::layer().json().with_writer(writer).boxed(),
    };
    tracing_subscriber::registry().with(filter).with(layer).init();
}
