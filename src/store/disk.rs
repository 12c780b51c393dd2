use async_trait::async_trait;
use chrono::NaiveDate;
use fjall::{Keyspace, PartitionCreateOptions, PartitionHandle, PersistMode};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::path::Path;
use tokio::sync::Mutex;
use tracing::debug;

use crate::core::error::StoreError;
use crate::core::rate::{ExchangeRate, NewRate, PeriodSource, PeriodSum, ProviderDescriptor};
use crate::core::store::RateStore;

impl From<fjall::Error> for StoreError {
    fn from(e: fjall::Error) -> Self {
        StoreError::Backend(e.to_string())
    }
}

/// Rate store persisted in a fjall keyspace.
///
/// Rates live in the `rates` partition under `CUR|YYYY-MM-DD|PROVIDER_ID`
/// so that a day's quotes and a date range are contiguous scans in provider
/// order. Provider descriptors live in the `providers` partition keyed by
/// their zero padded id.
pub struct DiskRateStore {
    keyspace: Keyspace,
    rates: PartitionHandle,
    providers: PartitionHandle,
    // Serializes check-then-insert sequences.
    write_lock: Mutex<()>,
}

fn rate_key(currency: &str, date: NaiveDate, provider_id: i64) -> String {
    format!("{currency}|{}|{provider_id:010}", date.format("%Y-%m-%d"))
}

fn provider_key(id: i64) -> String {
    format!("{id:010}")
}

fn parse_rate_key(key: &[u8]) -> Result<(String, NaiveDate, i64), StoreError> {
    let text = String::from_utf8_lossy(key).to_string();
    let corrupt = |reason: &str| StoreError::Corrupt {
        key: text.clone(),
        reason: reason.to_string(),
    };
    let mut parts = text.split('|');
    let (Some(currency), Some(date), Some(id), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(corrupt("expected three key segments"));
    };
    let date = NaiveDate::parse_from_str(date, "%Y-%m-%d").map_err(|_| corrupt("bad date"))?;
    let id = id.parse::<i64>().map_err(|_| corrupt("bad provider id"))?;
    Ok((currency.to_string(), date, id))
}

fn parse_rate(key: &[u8], value: &[u8]) -> Result<Decimal, StoreError> {
    serde_json::from_slice(value).map_err(|e| StoreError::Corrupt {
        key: String::from_utf8_lossy(key).to_string(),
        reason: e.to_string(),
    })
}

impl DiskRateStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let keyspace = fjall::Config::new(path).open()?;
        let rates = keyspace.open_partition("rates", PartitionCreateOptions::default())?;
        let providers = keyspace.open_partition("providers", PartitionCreateOptions::default())?;
        debug!(path = %path.display(), "Opened rate store");
        Ok(Self {
            keyspace,
            rates,
            providers,
            write_lock: Mutex::new(()),
        })
    }

    fn all_providers(&self) -> Result<Vec<ProviderDescriptor>, StoreError> {
        self.providers
            .iter()
            .map(|item| {
                let (key, value) = item?;
                serde_json::from_slice(&value).map_err(|e| StoreError::Corrupt {
                    key: String::from_utf8_lossy(&key).to_string(),
                    reason: e.to_string(),
                })
            })
            .collect()
    }

    fn provider_by_id(&self, id: i64) -> Result<ProviderDescriptor, StoreError> {
        let key = provider_key(id);
        let Some(value) = self.providers.get(&key)? else {
            return Err(StoreError::UnknownProvider(id));
        };
        serde_json::from_slice(&value).map_err(|e| StoreError::Corrupt {
            key,
            reason: e.to_string(),
        })
    }

    fn provider_by_name(&self, name: &str) -> Result<Option<ProviderDescriptor>, StoreError> {
        Ok(self.all_providers()?.into_iter().find(|p| p.name == name))
    }

    fn put_rate(&self, key: &str, rate: Decimal) -> Result<bool, StoreError> {
        if self.rates.contains_key(key)? {
            return Ok(false);
        }
        let value = serde_json::to_vec(&rate).map_err(|e| StoreError::Backend(e.to_string()))?;
        self.rates.insert(key, value)?;
        Ok(true)
    }

    fn persist(&self) -> Result<(), StoreError> {
        self.keyspace.persist(PersistMode::SyncAll)?;
        Ok(())
    }
}

#[async_trait]
impl RateStore for DiskRateStore {
    async fn get_rates_by_date_currency(
        &self,
        date: NaiveDate,
        currency: &str,
    ) -> Result<Vec<ExchangeRate>, StoreError> {
        let prefix = format!("{currency}|{}|", date.format("%Y-%m-%d"));
        let mut providers: BTreeMap<i64, ProviderDescriptor> = BTreeMap::new();
        let mut records = Vec::new();
        for item in self.rates.prefix(&prefix) {
            let (key, value) = item?;
            let (currency, date, provider_id) = parse_rate_key(&key)?;
            let rate = parse_rate(&key, &value)?;
            let provider = match providers.get(&provider_id) {
                Some(p) => p.clone(),
                None => {
                    let p = self.provider_by_id(provider_id)?;
                    providers.insert(provider_id, p.clone());
                    p
                }
            };
            records.push(ExchangeRate {
                date,
                currency,
                rate,
                provider: Some(provider),
            });
        }
        Ok(records)
    }

    async fn get_rate_by_date_currency_provider(
        &self,
        date: NaiveDate,
        currency: &str,
        provider_name: &str,
    ) -> Result<Option<ExchangeRate>, StoreError> {
        let Some(provider) = self.provider_by_name(provider_name)? else {
            return Ok(None);
        };
        let key = rate_key(currency, date, provider.id);
        let Some(value) = self.rates.get(&key)? else {
            return Ok(None);
        };
        Ok(Some(ExchangeRate {
            date,
            currency: currency.to_string(),
            rate: parse_rate(key.as_bytes(), &value)?,
            provider: Some(provider),
        }))
    }

    async fn insert_new_rate(
        &self,
        date: NaiveDate,
        provider: &ProviderDescriptor,
        currency: &str,
        rate: Decimal,
    ) -> Result<ExchangeRate, StoreError> {
        let _guard = self.write_lock.lock().await;
        let provider = self.provider_by_id(provider.id)?;
        let key = rate_key(currency, date, provider.id);
        let stored = match self.rates.get(&key)? {
            Some(existing) => parse_rate(key.as_bytes(), &existing)?,
            None => {
                self.put_rate(&key, rate)?;
                self.persist()?;
                rate
            }
        };
        Ok(ExchangeRate {
            date,
            currency: currency.to_string(),
            rate: stored,
            provider: Some(provider),
        })
    }

    async fn insert_exchange_rate_to_db(&self, records: &[NewRate]) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut known: Vec<i64> = Vec::new();
        let mut inserted = 0;
        for record in records {
            if !known.contains(&record.provider_id) {
                self.provider_by_id(record.provider_id)?;
                known.push(record.provider_id);
            }
            let key = rate_key(&record.currency, record.date, record.provider_id);
            if self.put_rate(&key, record.rate)? {
                inserted += 1;
            }
        }
        self.persist()?;
        debug!(received = records.len(), inserted, "Stored exchange rates");
        Ok(())
    }

    async fn get_or_create_provider_by_name(
        &self,
        name: &str,
    ) -> Result<ProviderDescriptor, StoreError> {
        let _guard = self.write_lock.lock().await;
        let providers = self.all_providers()?;
        if let Some(existing) = providers.iter().find(|p| p.name == name) {
            return Ok(existing.clone());
        }
        let provider = ProviderDescriptor {
            id: providers.iter().map(|p| p.id).max().unwrap_or(0) + 1,
            name: name.to_string(),
        };
        let value =
            serde_json::to_vec(&provider).map_err(|e| StoreError::Backend(e.to_string()))?;
        self.providers.insert(provider_key(provider.id), value)?;
        self.persist()?;
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
        let from = format!("{currency}|{}|", start_date.format("%Y-%m-%d"));
        let to = format!("{currency}|{}|~", end_date.format("%Y-%m-%d"));

        let mut sums: BTreeMap<i64, (i64, Decimal)> = BTreeMap::new();
        for item in self.rates.range(from..=to) {
            let (key, value) = item?;
            let (_, _, provider_id) = parse_rate_key(&key)?;
            let rate = parse_rate(&key, &value)?;
            let entry = sums.entry(provider_id).or_insert((0, Decimal::ZERO));
            entry.0 += 1;
            entry.1 += rate;
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
