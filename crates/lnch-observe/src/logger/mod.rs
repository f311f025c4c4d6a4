//! Process-wide `tracing` subscriber for the launcher binary.
//!
//! Everything is written to stderr (or journald) so that stdout only ever
//! carries reports and `explain` output. Filtering uses `EnvFilter`
//! directives, so `lnch.core=debug,warn` narrows output to one crate.

mod config;
mod error;
mod format;
mod log;

pub use config::LoggerConfig;
pub use error::LoggerError;
pub use format::LoggerFormat;

/// Install the global subscriber described by `cfg`. Only the first call in
/// a process can succeed.
pub fn logger_init(cfg: &LoggerConfig) -> Result<(), LoggerError> {
    log::install(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_install_is_refused() {
        let cfg = LoggerConfig::default().with_level("warn");
        // another test may have won the race for the global default
        let _ = logger_init(&cfg);
        assert!(matches!(logger_init(&cfg), Err(LoggerError::AlreadyInstalled)));
    }

    #[test]
    fn bad_filter_is_reported_before_install() {
        let cfg = LoggerConfig::default().with_level("lnch.core=chatty");
        let err = logger_init(&cfg).unwrap_err();
        assert!(matches!(err, LoggerError::InvalidFilter { ref directive, .. } if directive == "lnch.core=chatty"));
    }
}
