use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("invalid environment token '{0}' (expected KEY=VALUE)")]
    InvalidEnvToken(String),
    #[error("environment key must not be empty: '{0}'")]
    EmptyEnvKey(String),
    #[error("invalid environment variable name '{0}' (expected letters, digits and '_', not starting with a digit)")]
    InvalidEnvKey(String),
}
