//! Construction and configuration errors

use thiserror::Error;

/// Errors raised while building a multi-provider
#[derive(Debug, Error)]
pub enum MultiProviderError {
    #[error("at least one provider required")]
    NoProviders,

    #[error("multiple providers cannot share the name '{0}'")]
    NamingConflict(String),

    #[error("unknown strategy '{0}'")]
    UnknownStrategy(String),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Errors raised while loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadError(String),

    #[error("failed to parse configuration: {0}")]
    ParseError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, MultiProviderError>;
