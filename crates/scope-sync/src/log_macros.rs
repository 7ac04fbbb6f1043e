/// Domain-aware logging macros for the sync runtime.
///
/// Each macro injects a `domain` field automatically. Domains in use:
/// `sys` (lifecycle), `sync` (orchestrator rounds), `store` (persistence).
///
/// ```ignore
/// sc_info!(sync, device = %remote, pushed, pulled, "sync round complete");
/// sc_warn!(sync, error = %e, "transport send failed");
/// ```

#[doc(hidden)]
macro_rules! sc_log {
    ($level:ident, $domain:ident, $($field:tt)*) => {
        tracing::$level!(domain = stringify!($domain), $($field)*)
    };
}

macro_rules! sc_error {
    ($domain:ident, $($rest:tt)*) => {
        sc_log!(error, $domain, $($rest)*)
    };
}

macro_rules! sc_warn {
    ($domain:ident, $($rest:tt)*) => {
        sc_log!(warn, $domain, $($rest)*)
    };
}

macro_rules! sc_info {
    ($domain:ident, $($rest:tt)*) => {
        sc_log!(info, $domain, $($rest)*)
    };
}

#[allow(unused_macros)]
macro_rules! sc_debug {
    ($domain:ident, $($rest:tt)*) => {
        sc_log!(debug, $domain, $($rest)*)
    };
}
