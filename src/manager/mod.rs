//! Provider orchestration and rate reconciliation.

pub mod query;
pub mod reconcile;
pub mod update;

#[cfg(test)]
mod testing;

use chrono::{Days, NaiveDate};
use std::sync::Arc;
use tracing::{debug, error, instrument, warn};

use crate::core::clock::Clock;
use crate::core::error::{RateError, StoreError};
use crate::core::provider::RateProvider;
use crate::core::rate::{CurrencySet, ExchangeRate};
use crate::core::store::RateStore;

pub use reconcile::pick_the_best;
pub use update::{UpdateOutcome, UpdateReport};

/// Answers rate queries from stored records, filling gaps from the
/// configured providers.
pub struct ExchangeRateManager {
    store: Arc<dyn RateStore>,
    providers: Vec<Arc<dyn RateProvider>>,
    base_currency: String,
    supported_currencies: CurrencySet,
    clock: Arc<dyn Clock>,
}

impl ExchangeRateManager {
    pub fn new(
        store: Arc<dyn RateStore>,
        providers: Vec<Arc<dyn RateProvider>>,
        base_currency: &str,
        supported_currencies: CurrencySet,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            providers,
            base_currency: base_currency.to_string(),
            supported_currencies,
            clock,
        }
    }

    pub fn base_currency(&self) -> &str {
        &self.base_currency
    }

    pub fn supported_currencies(&self) -> &CurrencySet {
        &self.supported_currencies
    }

    pub fn providers(&self) -> &[Arc<dyn RateProvider>] {
        &self.providers
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    pub fn future_date_to_today(&self, date: NaiveDate) -> NaiveDate {
        let today = self.clock.today();
        if date > today {
            warn!(%date, %today, "Date is in the future, using today instead");
            return today;
        }
        date
    }

    /// All known rates of `currency` on `date`, one per provider in
    /// configured order.
    ///
    /// A provider's stored record is used when present. Otherwise today
    /// reuses yesterday's record, any other date is never fetched from a
    /// request limited provider, and the rest is fetched and stored. Stored
    /// records of providers no longer configured come last.
    #[instrument(skip(self))]
    pub async fn get_or_update_rate_by_date(
        &self,
        date: NaiveDate,
        currency: &str,
    ) -> Result<Vec<ExchangeRate>, RateError> {
        if currency == self.base_currency {
            return Ok(vec![ExchangeRate::base(currency, date)]);
        }

        let today = self.clock.today();
        let mut stored = self.store.get_rates_by_date_currency(date, currency).await?;
        let mut rates = Vec::with_capacity(self.providers.len() + stored.len());

        for provider in &self.providers {
            let name = provider.name();
            if let Some(pos) = stored.iter().position(|r| r.provider_name() == Some(name)) {
                rates.push(stored.remove(pos));
                continue;
            }

            if date == today {
                if let Some(yesterday) = today.checked_sub_days(Days::new(1)) {
                    let previous = self
                        .store
                        .get_rate_by_date_currency_provider(yesterday, currency, name)
                        .await?;
                    if let Some(previous) = previous {
                        debug!(provider = name, %yesterday, "Using yesterday's rate for today");
                        rates.push(previous);
                        continue;
                    }
                }
            } else if provider.has_request_limit() {
                debug!(provider = name, "Rates other than today's not fetched from request limited provider");
                continue;
            }

            match self.fetch_and_store(provider.as_ref(), date, currency, today).await {
                Ok(Some(rate)) => rates.push(rate),
                Ok(None) => debug!(provider = name, "No rate from provider"),
                Err(e) => error!(provider = name, error = %e, "Failed to store fetched rate"),
            }
        }

        rates.extend(stored);
        Ok(rates)
    }

    async fn fetch_and_store(
        &self,
        provider: &dyn RateProvider,
        date: NaiveDate,
        currency: &str,
        today: NaiveDate,
    ) -> Result<Option<ExchangeRate>, StoreError> {
        let supported = provider.get_supported_currencies(today).await;
        if !supported.contains(currency) {
            debug!(provider = provider.name(), "Currency not supported by provider");
            return Ok(None);
        }
        let Some(rate) = provider.get_by_date(date, currency).await else {
            return Ok(None);
        };
        let descriptor = self
            .store
            .get_or_create_provider_by_name(provider.name())
            .await?;
        let record = self
            .store
            .insert_new_rate(date, &descriptor, currency, rate)
            .await?;
        Ok(Some(record))
    }
}
