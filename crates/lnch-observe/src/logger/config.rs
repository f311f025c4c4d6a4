use crate::logger::{error::LoggerError, format::LoggerFormat, log::level_filter};

/// How the launcher binary logs.
#[derive(Debug, Clone)]
pub struct LoggerConfig {
    pub format: LoggerFormat,
    /// `EnvFilter` directive, e.g. `info` or `lnch=debug,warn`.
    pub level: String,
    pub with_targets: bool,
    pub use_color: bool,
}

impl LoggerConfig {
    /// Build from the `--log-level` and `--log-format` flags, rejecting a
    /// bad directive or format before anything is installed.
    pub fn from_flags(level: &str, format: &str) -> Result<Self, LoggerError> {
        level_filter(level)?;
        Ok(Self::default()
            .with_level(level)
            .with_format(format.parse()?))
    }

    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }

    /// Switch format. Json output never carries ANSI colour.
    pub fn with_format(mut self, format: LoggerFormat) -> Self {
        self.format = format;
        if format != LoggerFormat::Text {
            self.use_color = false;
        }
        self
    }
}

impl Default for LoggerConfig {
    fn default() -> Self {
        // stdout carries reports, so colour follows stderr's terminal
        let use_color = cfg!(test) || atty::is(atty::Stream::Stderr);
        Self {
            format: LoggerFormat::Text,
            level: "info".to_string(),
            with_targets: true,
            use_color,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_fill_level_and_format() {
        let cfg = LoggerConfig::from_flags("lnch.core=debug,warn", "JSON").unwrap();
        assert_eq!(cfg.level, "lnch.core=debug,warn");
        assert_eq!(cfg.format, LoggerFormat::Json);
        assert!(!cfg.use_color);
        assert!(cfg.with_targets);
    }

    #[test]
    fn flags_reject_bad_input() {
        assert!(matches!(
            LoggerConfig::from_flags("lnch=loud", "text"),
            Err(LoggerError::InvalidFilter { .. })
        ));
        assert!(matches!(
            LoggerConfig::from_flags("info", "yaml"),
            Err(LoggerError::UnknownFormat(f)) if f == "yaml"
        ));
    }
}
