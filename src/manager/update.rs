use chrono::NaiveDate;
use std::fmt::Display;
use std::sync::Arc;
use tracing::{error, info, instrument};

use super::ExchangeRateManager;
use crate::core::error::{RateError, StoreError};
use crate::core::provider::RateProvider;
use crate::core::rate::{DayRates, NewRate};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// Number of rates handed to the store. Already stored keys are
    /// skipped by the store and still counted here.
    Stored(usize),
    /// The provider returned nothing.
    Empty,
    Failed(String),
}

impl Display for UpdateOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UpdateOutcome::Stored(count) => write!(f, "stored {count} rates"),
            UpdateOutcome::Empty => write!(f, "no rates returned"),
            UpdateOutcome::Failed(reason) => write!(f, "failed: {reason}"),
        }
    }
}

/// Outcome of a batch update, one entry per provider in visiting order.
#[derive(Debug, Clone, Default)]
pub struct UpdateReport {
    pub entries: Vec<(String, UpdateOutcome)>,
}

impl UpdateReport {
    fn record(&mut self, provider: &str, outcome: UpdateOutcome) {
        info!(provider, %outcome, "Provider update finished");
        self.entries.push((provider.to_string(), outcome));
    }

    pub fn stored_total(&self) -> usize {
        self.entries
            .iter()
            .map(|(_, outcome)| match outcome {
                UpdateOutcome::Stored(count) => *count,
                _ => 0,
            })
            .sum()
    }

    pub fn has_failures(&self) -> bool {
        self.entries
            .iter()
            .any(|(_, outcome)| matches!(outcome, UpdateOutcome::Failed(_)))
    }
}

impl ExchangeRateManager {
    async fn store_rates(
        &self,
        provider: &dyn RateProvider,
        rows: impl Iterator<Item = (NaiveDate, &DayRates)>,
    ) -> Result<usize, StoreError> {
        let descriptor = self
            .store
            .get_or_create_provider_by_name(provider.name())
            .await?;
        let provider_id = descriptor.id;
        let records: Vec<NewRate> = rows
            .flat_map(|(date, day_rates)| {
                day_rates.iter().map(move |(currency, rate)| NewRate {
                    date,
                    currency: currency.clone(),
                    provider_id,
                    rate: *rate,
                })
            })
            .collect();
        self.store.insert_exchange_rate_to_db(&records).await?;
        Ok(records.len())
    }

    /// Fetches and stores the rates of every configured currency on `date`
    /// from each of `providers`. A failing provider never stops the others.
    #[instrument(skip(self, providers))]
    pub async fn update_all_rates_by_date(
        &self,
        date: NaiveDate,
        providers: &[Arc<dyn RateProvider>],
    ) -> UpdateReport {
        let mut report = UpdateReport::default();
        for provider in providers {
            let name = provider.name();
            let day_rates = provider
                .get_all_by_date(date, &self.supported_currencies)
                .await;
            if day_rates.is_empty() {
                error!(provider = name, %date, "Provider did not return any exchange rates");
                report.record(name, UpdateOutcome::Empty);
                continue;
            }

            let outcome = match self
                .store_rates(provider.as_ref(), std::iter::once((date, &day_rates)))
                .await
            {
                Ok(count) => UpdateOutcome::Stored(count),
                Err(e) => {
                    error!(provider = name, %date, error = %e, "Failed to store exchange rates");
                    UpdateOutcome::Failed(e.to_string())
                }
            };
            report.record(name, outcome);
        }
        report
    }

    /// Back-fills every configured provider from `origin_date` up to
    /// yesterday. Storage failures abort the run.
    #[instrument(skip(self))]
    pub async fn update_all_historical_rates(
        &self,
        origin_date: NaiveDate,
    ) -> Result<UpdateReport, RateError> {
        let mut report = UpdateReport::default();
        for provider in &self.providers {
            let name = provider.name();
            let historical = provider
                .get_historical(origin_date, &self.supported_currencies)
                .await;
            if historical.is_empty() {
                error!(provider = name, %origin_date, "Provider did not return any historical rates");
                report.record(name, UpdateOutcome::Empty);
                continue;
            }
            info!(provider = name, days = historical.len(), "Storing historical rates");
            let count = self
                .store_rates(provider.as_ref(), historical.iter().map(|(d, r)| (*d, r)))
                .await?;
            report.record(name, UpdateOutcome::Stored(count));
        }
        Ok(report)
    }
}
