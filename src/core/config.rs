use crate::core::rate::CurrencySet;
use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf};
use tracing::debug;

const DEFAULT_CURRENCIES: &[&str] = &[
    "AUD", "BGN", "BRL", "CAD", "CHF", "CNY", "CZK", "DKK", "EUR", "GBP", "HKD", "HUF",
    "IDR", "ILS", "INR", "ISK", "JPY", "KRW", "MXN", "MYR", "NOK", "NZD", "PHP", "PLN",
    "RON", "SEK", "SGD", "THB", "TRY", "USD", "ZAR",
];

/// One configured rate source. The order of entries in the config file is the
/// order in which the sources are consulted.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(tag = "name")]
pub enum ProviderConfig {
    #[serde(rename = "grandtrunk")]
    GrandTrunk {
        #[serde(default)]
        base_url: Option<String>,
    },
    #[serde(rename = "fixer.io")]
    Fixer {
        #[serde(default)]
        base_url: Option<String>,
        #[serde(default)]
        access_key: Option<String>,
    },
    #[serde(rename = "frankfurter")]
    Frankfurter {
        #[serde(default)]
        base_url: Option<String>,
    },
}

impl ProviderConfig {
    pub fn name(&self) -> &'static str {
        match self {
            ProviderConfig::GrandTrunk { .. } => "grandtrunk",
            ProviderConfig::Fixer { .. } => "fixer.io",
            ProviderConfig::Frankfurter { .. } => "frankfurter",
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    #[default]
    Disk,
    Memory,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: "localhost".to_string(),
            port: 8080,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    #[serde(default = "default_base_currency")]
    pub base_currency: String,
    #[serde(default = "default_currencies")]
    pub currencies: CurrencySet,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_providers")]
    pub providers: Vec<ProviderConfig>,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageKind,
    pub data_path: Option<String>,
}

fn default_base_currency() -> String {
    "USD".to_string()
}

fn default_currencies() -> CurrencySet {
    DEFAULT_CURRENCIES.iter().map(|c| c.to_string()).collect()
}

fn default_user_agent() -> String {
    format!("xrates/{}", env!("CARGO_PKG_VERSION"))
}

fn default_providers() -> Vec<ProviderConfig> {
    vec![
        ProviderConfig::GrandTrunk { base_url: None },
        ProviderConfig::Frankfurter { base_url: None },
    ]
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            base_currency: default_base_currency(),
            currencies: default_currencies(),
            user_agent: default_user_agent(),
            providers: default_providers(),
            server: ServerConfig::default(),
            storage: StorageKind::default(),
            data_path: None,
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("in", "codito", "xrates")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn default_data_path(&self) -> Result<PathBuf> {
        if let Some(custom_path) = &self.data_path {
            return Ok(PathBuf::from(custom_path));
        }
        let proj_dirs = ProjectDirs::from("in", "codito", "xrates")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.data_dir().to_path_buf())
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let mut config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        config.normalize();
        debug!("Successfully loaded config");
        Ok(config)
    }

    /// Currency codes are compared case sensitively everywhere else.
    fn normalize(&mut self) {
        self.base_currency = self.base_currency.to_uppercase();
        self.currencies = self.currencies.iter().map(|c| c.to_uppercase()).collect();
    }
}
