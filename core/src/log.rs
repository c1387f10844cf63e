//! Logging macros
//!
//! For the macros to properly compile, the calling crate must add a dependency
//! to crate log (ie. `log.workspace = true`).

/// Tries to init the global logger, but does not panic if it was already setup.
/// Should be used for tests.
pub fn try_init_logger(filters: &str) {
    let _ = env_logger::Builder::new()
        .format_target(false)
        .format_timestamp_secs()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .parse_filters(filters)
        .try_init();
}

#[macro_export]
macro_rules! trace {
    ($($t:tt)*) => {
        log::trace!($($t)*);
    };
}

#[macro_export]
macro_rules! debug {
    ($($t:tt)*) => {
        log::debug!($($t)*);
    };
}

#[macro_export]
macro_rules! info {
    ($($t:tt)*) => {
        log::info!($($t)*);
    };
}

#[macro_export]
macro_rules! warn {
    ($($t:tt)*) => {
        log::warn!($($t)*);
    };
}
