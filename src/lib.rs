pub mod cli;
pub mod core;
pub mod manager;
pub mod providers;
pub mod server;
pub mod store;

use anyhow::Result;
use chrono::NaiveDate;
use std::sync::Arc;
use tracing::{debug, info};

use crate::core::clock::{Clock, SystemClock};
use crate::core::config::AppConfig;
use crate::manager::ExchangeRateManager;
use crate::providers::ProviderRegistry;

#[derive(Debug, Clone, PartialEq)]
pub enum AppCommand {
    Update {
        date: Option<NaiveDate>,
        providers: Vec<String>,
        exclude_providers: Vec<String>,
    },
    UpdateAll {
        origin_date: NaiveDate,
    },
    Rate {
        from: String,
        to: String,
        date: Option<NaiveDate>,
    },
    Average {
        from: String,
        to: String,
        start_date: NaiveDate,
        end_date: NaiveDate,
    },
    Intervals {
        from: String,
        to: String,
        date: Option<NaiveDate>,
    },
    Serve {
        host: Option<String>,
        port: Option<u16>,
    },
}

/// A manager wired to the configured store and providers.
pub struct App {
    pub manager: Arc<ExchangeRateManager>,
    pub registry: ProviderRegistry,
}

pub fn build_app(config: &AppConfig, clock: Arc<dyn Clock>) -> Result<App> {
    let store = store::open_store(config)?;
    let registry = ProviderRegistry::from_config(config, clock.clone())?;
    let manager = ExchangeRateManager::new(
        store,
        registry.all().to_vec(),
        &config.base_currency,
        config.currencies.clone(),
        clock,
    );
    Ok(App {
        manager: Arc::new(manager),
        registry,
    })
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!(
        base_currency = %config.base_currency,
        providers = config.providers.len(),
        "Loaded config"
    );
    execute(command, &config, Arc::new(SystemClock)).await
}

pub async fn execute(command: AppCommand, config: &AppConfig, clock: Arc<dyn Clock>) -> Result<()> {
    let app = build_app(config, clock)?;
    let manager = app.manager.as_ref();

    match command {
        AppCommand::Update {
            date,
            providers,
            exclude_providers,
        } => cli::update::run(manager, &app.registry, date, &providers, &exclude_providers).await,
        AppCommand::UpdateAll { origin_date } => {
            cli::update::run_historical(manager, origin_date).await
        }
        AppCommand::Rate { from, to, date } => {
            cli::query::show_rate(manager, &from, &to, date).await
        }
        AppCommand::Average {
            from,
            to,
            start_date,
            end_date,
        } => cli::query::show_average(manager, &from, &to, start_date, end_date).await,
        AppCommand::Intervals { from, to, date } => {
            cli::query::show_intervals(manager, &from, &to, date).await
        }
        AppCommand::Serve { host, port } => {
            let host = host.unwrap_or_else(|| config.server.host.clone());
            let port = port.unwrap_or(config.server.port);
            info!(%host, port, "Starting query server");
            server::serve(app.manager.clone(), &host, port).await
        }
    }
}
