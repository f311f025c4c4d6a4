use time::{UtcOffset, format_description::well_known::Rfc3339};
use tracing::Subscriber;
use tracing_subscriber::{
    EnvFilter, fmt, fmt::time::OffsetTime, layer::SubscriberExt, util::SubscriberInitExt,
    util::TryInitError,
};

use crate::logger::{config::LoggerConfig, error::LoggerError, format::LoggerFormat};

pub(super) fn install(cfg: &LoggerConfig) -> Result<(), LoggerError> {
    let filter = level_filter(&cfg.level)?;
    let base = tracing_subscriber::registry().with(filter);

    match cfg.format {
        LoggerFormat::Text => {
            let layer = fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(cfg.use_color)
                .with_target(cfg.with_targets)
                .with_timer(local_rfc3339());
            try_install(base.with(layer), cfg.format)
        }
        LoggerFormat::Json => {
            // one flat object per line; session fields sit beside the message
            let layer = fmt::layer()
                .json()
                .flatten_event(true)
                .with_writer(std::io::stderr)
                .with_ansi(false)
                .with_target(cfg.with_targets)
                .with_timer(local_rfc3339());
            try_install(base.with(layer), cfg.format)
        }
        LoggerFormat::Journald => journald(base),
    }
}

/// Parse an `EnvFilter` directive, keeping the parser's reason.
pub(super) fn level_filter(directive: &str) -> Result<EnvFilter, LoggerError> {
    EnvFilter::try_new(directive).map_err(|e| LoggerError::InvalidFilter {
        directive: directive.to_string(),
        reason: e.to_string(),
    })
}

fn local_rfc3339() -> OffsetTime<Rfc3339> {
    let offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);
    OffsetTime::new(offset, Rfc3339)
}

fn try_install<S>(subscriber: S, format: LoggerFormat) -> Result<(), LoggerError>
where
    S: Subscriber + Send + Sync + 'static,
{
    subscriber
        .try_init()
        .map_err(|e| install_error(e, format))
}

/// Both the `log` bridge and the dispatcher refuse a second registration.
fn install_error(e: TryInitError, format: LoggerFormat) -> LoggerError {
    let debug = format!("{e:?}");
    if debug.contains("SetGlobalDefaultError") || debug.contains("SetLoggerError") {
        return LoggerError::AlreadyInstalled;
    }
    LoggerError::Install {
        format,
        reason: e.to_string(),
    }
}

#[cfg(all(target_os = "linux", feature = "journald"))]
fn journald<S>(base: S) -> Result<(), LoggerError>
where
    S: Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a> + Send + Sync + 'static,
{
    let layer = tracing_journald::layer().map_err(|e| LoggerError::Install {
        format: LoggerFormat::Journald,
        reason: e.to_string(),
    })?;
    try_install(base.with(layer), LoggerFormat::Journald)
}

#[cfg(not(all(target_os = "linux", feature = "journald")))]
fn journald<S>(_base: S) -> Result<(), LoggerError> {
    Err(LoggerError::JournaldUnavailable)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_accepts_directives() {
        assert!(level_filter("info").is_ok());
        assert!(level_filter("lnch.core=debug,warn").is_ok());
    }

    #[test]
    fn filter_error_names_the_directive() {
        let err = level_filter("lnch=loud").unwrap_err();
        match &err {
            LoggerError::InvalidFilter { directive, reason } => {
                assert_eq!(directive, "lnch=loud");
                assert!(!reason.is_empty());
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(err.to_string().starts_with("invalid log filter 'lnch=loud'"));
    }
}
