pub mod fixer;
pub mod frankfurter;
pub mod grandtrunk;
pub mod http;
pub mod limit;

use anyhow::{Result, bail};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::core::clock::Clock;
use crate::core::config::{AppConfig, ProviderConfig};
use crate::core::provider::RateProvider;

pub use fixer::FixerProvider;
pub use frankfurter::FrankfurterProvider;
pub use grandtrunk::GrandTrunkProvider;
pub use limit::RequestLimit;

/// Rate providers in the order they were configured.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: Vec<Arc<dyn RateProvider>>,
}

impl ProviderRegistry {
    pub fn new(providers: Vec<Arc<dyn RateProvider>>) -> Self {
        Self { providers }
    }

    pub fn from_config(config: &AppConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        let mut providers: Vec<Arc<dyn RateProvider>> = Vec::new();
        for entry in &config.providers {
            let base = config.base_currency.as_str();
            let agent = config.user_agent.as_str();
            match entry {
                ProviderConfig::GrandTrunk { base_url } => {
                    let url = base_url.as_deref().unwrap_or(grandtrunk::DEFAULT_BASE_URL);
                    providers.push(Arc::new(GrandTrunkProvider::new(url, base, agent, clock.clone())?));
                }
                ProviderConfig::Fixer {
                    base_url,
                    access_key,
                } => {
                    let Some(key) = access_key.as_deref().filter(|k| !k.is_empty()) else {
                        warn!(provider = fixer::NAME, "No access key configured, provider skipped");
                        continue;
                    };
                    let url = base_url.as_deref().unwrap_or(fixer::DEFAULT_BASE_URL);
                    providers.push(Arc::new(FixerProvider::new(url, key, base, agent, clock.clone())?));
                }
                ProviderConfig::Frankfurter { base_url } => {
                    let url = base_url.as_deref().unwrap_or(frankfurter::DEFAULT_BASE_URL);
                    providers.push(Arc::new(FrankfurterProvider::new(url, base, agent, clock.clone())?));
                }
            }
        }

        let registry = Self::new(providers);
        if registry.providers.is_empty() {
            warn!("No rate providers configured");
        }
        debug!(providers = ?registry.names(), "Providers ready");
        Ok(registry)
    }

    pub fn all(&self) -> &[Arc<dyn RateProvider>] {
        &self.providers
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn RateProvider>> {
        self.providers.iter().find(|p| p.name() == name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.providers.iter().map(|p| p.name().to_string()).collect()
    }

    /// Providers named in `include` (all when empty) minus those in
    /// `exclude`, in configured order. Unknown names are an error.
    pub fn select(&self, include: &[String], exclude: &[String]) -> Result<Vec<Arc<dyn RateProvider>>> {
        for name in include.iter().chain(exclude) {
            if self.get(name).is_none() {
                bail!(
                    "Unknown provider '{}', configured providers: {}",
                    name,
                    self.names().join(", ")
                );
            }
        }
        Ok(self
            .providers
            .iter()
            .filter(|p| include.is_empty() || include.iter().any(|n| n == p.name()))
            .filter(|p| !exclude.iter().any(|n| n == p.name()))
            .cloned()
            .collect())
    }
}
