//! Configuration for the verification service
//!
//! Keys are snake_case in every source (`[translator.decision_policy]
//! accept_at = 0.9`, `AVE_STORAGE__MAX_CONNECTIONS=20`). Unknown keys fail
//! the load rather than falling back to a default.

use ave_engine::TranslatorConfig;
use ave_storage::StorageConfig;
use serde::{Deserialize, Serialize};

/// Top-level service configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AveConfig {
    /// Defaults stamped onto compiled specs
    #[serde(default)]
    pub translator: TranslatorConfig,

    /// Storage backend
    #[serde(default)]
    pub storage: StorageConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,

    /// JSON format
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl AveConfig {
    /// The optional file, then `AVE_`-prefixed environment variables
    /// (`AVE_STORAGE__TYPE=postgres`, `AVE_LOGGING__JSON=true`). Anything
    /// neither source sets takes its serde default.
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("AVE")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: Self = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), config::ConfigError> {
        self.translator
            .validate()
            .map_err(|e| config::ConfigError::Message(format!("translator: {e}")))?;
        if self.logging.level.trim().is_empty() {
            return Err(config::ConfigError::Message(
                "logging.level must not be blank".to_string(),
            ));
        }
        Ok(())
    }
}
