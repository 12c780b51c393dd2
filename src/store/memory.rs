use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use tokio::sync::Mutex;
use tracing::debug;

use crate::core::error::StoreError;
use crate::core::rate::{ExchangeRate, NewRate, PeriodSource, PeriodSum, ProviderDescriptor};
use crate::core::store::RateStore;

type RateKey = (String, NaiveDate, i64);

#[derive(Default)]
struct Inner {
    providers: Vec<ProviderDescriptor>,
    rates: BTreeMap<RateKey, Decimal>,
}

impl Inner {
    fn provider(&self, id: i64) -> Result<&ProviderDescriptor, StoreError> {
        self.providers
            .iter()
            .find(|p| p.id == id)
            .ok_or(StoreError::UnknownProvider(id))
    }

    fn record(&self, key: &RateKey, rate: Decimal) -> Result<ExchangeRate, StoreError> {
        Ok(ExchangeRate {
            currency: key.0.clone(),
            date: key.1,
            rate,
            provider: Some(self.provider(key.2)?.clone()),
        })
    }
}

/// Rate store kept in process memory. Used for tests and throwaway runs.
#[derive(Default)]
pub struct MemoryRateStore {
    inner: Mutex<Inner>,
}

impl MemoryRateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RateStore for MemoryRateStore {
    async fn get_rates_by_date_currency(
        &self,
        date: NaiveDate,
        currency: &str,
    ) -> Result<Vec<ExchangeRate>, StoreError> {
        let inner = self.inner.lock().await;
        let from = (currency.to_string(), date, i64::MIN);
        let to = (currency.to_string(), date, i64::MAX);
        inner
            .rates
            .range(from..=to)
            .map(|(key, rate)| inner.record(key, *rate))
            .collect()
    }

    async fn get_rate_by_date_currency_provider(
        &self,
        date: NaiveDate,
        currency: &str,
        provider_name: &str,
    ) -> Result<Option<ExchangeRate>, StoreError> {
        let inner = self.inner.lock().await;
        let Some(provider) = inner.providers.iter().find(|p| p.name == provider_name) else {
            return Ok(None);
        };
        let key = (currency.to_string(), date, provider.id);
        match inner.rates.get(&key) {
            Some(rate) => Ok(Some(inner.record(&key, *rate)?)),
            None => Ok(None),
        }
    }

    async fn insert_new_rate(
        &self,
        date: NaiveDate,
        provider: &ProviderDescriptor,
        currency: &str,
        rate: Decimal,
    ) -> Result<ExchangeRate, StoreError> {
        let mut inner = self.inner.lock().await;
        inner.provider(provider.id)?;
        let key = (currency.to_string(), date, provider.id);
        let stored = *inner.rates.entry(key.clone()).or_insert(rate);
        inner.record(&key, stored)
    }

    async fn insert_exchange_rate_to_db(&self, records: &[NewRate]) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        let mut inserted = 0;
        for record in records {
            inner.provider(record.provider_id)?;
            let key = (record.currency.clone(), record.date, record.provider_id);
            if !inner.rates.contains_key(&key) {
                inner.rates.insert(key, record.rate);
                inserted += 1;
            }
        }
        debug!(received = records.len(), inserted, "Stored exchange rates");
        Ok(())
    }

    async fn get_or_create_provider_by_name(
        &self,
        name: &str,
    ) -> Result<ProviderDescriptor, StoreError> {
        let mut inner = self.inner.lock().await;
        if let Some(existing) = inner.providers.iter().find(|p| p.name == name) {
            return Ok(existing.clone());
        }
        let provider = ProviderDescriptor {
            id: inner.providers.len() as i64 + 1,
            name: name.to_string(),
        };
        inner.providers.push(provider.clone());
        debug!(provider = name, id = provider.id, "Created provider");
        Ok(provider)
    }

    async fn get_sum_of_rates_in_period(
        &self,
        start_date: NaiveDate,
        end_date: NaiveDate,
        currency: &str,
    ) -> Result<Vec<PeriodSum>, StoreError> {
        if start_date > end_date {
            return Ok(Vec::new());
        }
        let inner = self.inner.lock().await;
        let from = (currency.to_string(), start_date, i64::MIN);
        let to = (currency.to_string(), end_date, i64::MAX);

        let mut sums: BTreeMap<i64, (i64, Decimal)> = BTreeMap::new();
        for ((_, _, provider_id), rate) in inner.rates.range(from..=to) {
            let entry = sums.entry(*provider_id).or_insert((0, Decimal::ZERO));
            entry.0 += 1;
            entry.1 += *rate;
        }
        Ok(sums
            .into_iter()
            .map(|(id, (count, sum))| PeriodSum {
                source: PeriodSource::Provider(id),
                count,
                sum,
            })
            .collect())
    }
}
