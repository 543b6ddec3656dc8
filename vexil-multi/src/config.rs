// Facade configuration

use crate::provider::DEFAULT_NAME;
use crate::strategy::{
    ComparisonStrategy, EvaluationStrategy, FirstMatchStrategy, FirstSuccessfulStrategy,
    MismatchCallback,
};
use crate::{ConfigError, MultiProviderError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use tracing::debug;

/// Strategy selection
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StrategyConfig {
    #[default]
    FirstMatch,
    FirstSuccessful,
    Comparison {
        /// Child whose answer wins when children disagree
        #[serde(default, skip_serializing_if = "Option::is_none")]
        fallback_provider: Option<String>,
    },
}

impl StrategyConfig {
    /// Instantiate the configured strategy.
    ///
    /// `on_mismatch` is only used by the comparison strategy.
    pub fn build(&self, on_mismatch: Option<MismatchCallback>) -> Box<dyn EvaluationStrategy> {
        match self {
            Self::FirstMatch => Box::new(FirstMatchStrategy::new()),
            Self::FirstSuccessful => Box::new(FirstSuccessfulStrategy::new()),
            Self::Comparison { fallback_provider } => {
                let mut strategy = ComparisonStrategy::new().with_shared_callback(on_mismatch);
                if let Some(fallback) = fallback_provider {
                    strategy = strategy.with_fallback_provider(fallback.clone());
                }
                Box::new(strategy)
            }
        }
    }
}

impl FromStr for StrategyConfig {
    type Err = MultiProviderError;

    /// Accepts `first_match`, `first-match`, `FirstMatch` and so on
    fn from_str(s: &str) -> Result<Self> {
        let normalized: String = s
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .collect::<String>()
            .to_lowercase();

        match normalized.as_str() {
            "firstmatch" => Ok(Self::FirstMatch),
            "firstsuccessful" => Ok(Self::FirstSuccessful),
            "comparison" => Ok(Self::Comparison {
                fallback_provider: None,
            }),
            _ => Err(MultiProviderError::UnknownStrategy(s.to_string())),
        }
    }
}

/// Facade configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MultiProviderConfig {
    /// Facade name, used in events and synthetic results
    pub name: String,
    pub strategy: StrategyConfig,
}

impl Default for MultiProviderConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_NAME.to_string(),
            strategy: StrategyConfig::default(),
        }
    }
}

/// Supported configuration file formats
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FileFormat {
    Json,
    Toml,
}

impl FileFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "json" => Some(FileFormat::Json),
            "toml" => Some(FileFormat::Toml),
            _ => None,
        }
    }
}

impl MultiProviderConfig {
    pub fn new(name: impl Into<String>, strategy: StrategyConfig) -> Self {
        Self {
            name: name.into(),
            strategy,
        }
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| {
            ConfigError::ParseError(format!("TOML parse error: {}", e)).into()
        })
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        serde_json::from_str(content).map_err(|e| {
            ConfigError::ParseError(format!("JSON parse error: {}", e)).into()
        })
    }

    /// Load from a `.toml` or `.json` file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .ok_or_else(|| ConfigError::LoadError("No file extension found".to_string()))?;
        let format = FileFormat::from_extension(ext)
            .ok_or_else(|| ConfigError::LoadError(format!("Unsupported format: {}", ext)))?;

        let content = fs::read_to_string(path).map_err(ConfigError::IoError)?;
        debug!(path = %path.display(), ?format, "Loading multi-provider configuration");

        match format {
            FileFormat::Json => Self::from_json_str(&content),
            FileFormat::Toml => Self::from_toml_str(&content),
        }
    }

    /// Load from `<PREFIX>_NAME`, `<PREFIX>_STRATEGY` and
    /// `<PREFIX>_FALLBACK_PROVIDER`. Missing variables keep their defaults.
    pub fn from_env(prefix: &str) -> Result<Self> {
        let vars: HashMap<String, String> = env::vars()
            .filter(|(key, _)| key.starts_with(prefix))
            .collect();
        Self::from_vars(prefix, &vars)
    }

    /// Same as [`from_env`](Self::from_env) over an explicit variable map
    pub fn from_vars(prefix: &str, vars: &HashMap<String, String>) -> Result<Self> {
        let var = |key: &str| {
            vars.get(&format!("{}_{}", prefix, key))
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
        };

        let mut config = Self::default();

        if let Some(name) = var("NAME") {
            config.name = name.to_string();
        }

        if let Some(strategy) = var("STRATEGY") {
            config.strategy = strategy.parse()?;
        }

        if let Some(fallback) = var("FALLBACK_PROVIDER") {
            match &mut config.strategy {
                StrategyConfig::Comparison { fallback_provider } => {
                    *fallback_provider = Some(fallback.to_string());
                }
                other => {
                    return Err(ConfigError::LoadError(format!(
                        "{}_FALLBACK_PROVIDER is only valid for the comparison strategy, not {:?}",
                        prefix, other
                    ))
                    .into());
                }
            }
        }

        Ok(config)
    }
}

/// Load variables from a `.env` file into the process environment
pub fn load_dotenv(path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    dotenvy::from_path(path).map_err(|e| {
        ConfigError::LoadError(format!("Failed to load {}: {}", path.display(), e))
    })?;
    debug!(path = %path.display(), "Loaded environment file");
    Ok(())
}
