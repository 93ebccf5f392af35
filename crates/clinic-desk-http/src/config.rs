//! Client configuration.

use std::path::{Path, PathBuf};

use clinic_desk_core::state::CollectionNames;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default log filter when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    "clinic_desk_core=info,clinic_desk_http=info"
}

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Settings for talking to the clinic records service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Service root, e.g. `http://localhost:3000`
    pub base_url: String,
    /// Per-request timeout
    pub timeout_secs: u64,
    /// Extra attempts for collection listings after a network error or 5xx
    pub max_retries: u32,
    /// Remote collection names
    pub collections: CollectionNames,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            timeout_secs: 10,
            max_retries: 2,
            collections: CollectionNames::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from default locations or use defaults.
    pub fn load() -> Result<Self> {
        let config_paths = [
            PathBuf::from("clinic-desk.toml"),
            dirs::config_dir()
                .map(|p| p.join("clinic-desk/config.toml"))
                .unwrap_or_default(),
        ];

        for path in &config_paths {
            if !path.as_os_str().is_empty() && path.exists() {
                tracing::info!("Loading config from: {}", path.display());
                return Self::from_file(path);
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Config::default())
    }

    /// Same configuration pointed at another service root.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Result<Self> {
        self.base_url = base_url.into();
        self.validate()?;
        Ok(self)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        let base_url = self.base_url.trim();
        if base_url.is_empty() {
            return Err(ConfigError::Invalid("base_url must not be empty".to_string()));
        }
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ConfigError::Invalid(format!(
                "base_url must be an http(s) URL, got {}",
                base_url
            )));
        }
        if self.timeout_secs == 0 {
            return Err(ConfigError::Invalid("timeout_secs must be > 0".to_string()));
        }

        let names = &self.collections;
        let all = [
            &names.patients,
            &names.appointments,
            &names.consultations,
            &names.practitioners,
            &names.blood_groups,
            &names.appointment_reasons,
            &names.appointment_statuses,
            &names.payment_modes,
        ];
        if all.iter().any(|name| name.trim().is_empty()) {
            return Err(ConfigError::Invalid("collection names must not be empty".to_string()));
        }

        Ok(())
    }
}
