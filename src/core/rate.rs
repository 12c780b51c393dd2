//! Exchange rate records and the value types passed between the manager,
//! the providers and the store.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Display;

/// Ordered set of ISO currency codes. Ordered so that requests and stored
/// batches are deterministic.
pub type CurrencySet = BTreeSet<String>;

/// Rates of a single day keyed by currency code.
pub type DayRates = BTreeMap<String, Decimal>;

/// Rates of many days keyed by date.
pub type HistoricalRates = BTreeMap<NaiveDate, DayRates>;

/// A persisted rate source, created lazily by name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProviderDescriptor {
    pub id: i64,
    pub name: String,
}

/// A single rate of `currency` against the base currency on `date`.
///
/// `provider` is `None` only for the synthetic base currency rate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeRate {
    pub date: NaiveDate,
    pub currency: String,
    pub rate: Decimal,
    pub provider: Option<ProviderDescriptor>,
}

impl ExchangeRate {
    /// The base currency is always worth exactly one unit of itself.
    pub fn base(currency: &str, date: NaiveDate) -> Self {
        Self {
            date,
            currency: currency.to_string(),
            rate: Decimal::ONE,
            provider: None,
        }
    }

    pub fn provider_name(&self) -> Option<&str> {
        self.provider.as_ref().map(|p| p.name.as_str())
    }
}

/// A row for bulk insertion.
#[derive(Debug, Clone, PartialEq)]
pub struct NewRate {
    pub date: NaiveDate,
    pub currency: String,
    pub provider_id: i64,
    pub rate: Decimal,
}

/// Where a period sum came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PeriodSource {
    Base,
    Provider(i64),
}

impl Display for PeriodSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PeriodSource::Base => write!(f, "BASE"),
            PeriodSource::Provider(id) => write!(f, "{id}"),
        }
    }
}

/// Number of stored days and the sum of their rates for one source.
#[derive(Debug, Clone, PartialEq)]
pub struct PeriodSum {
    pub source: PeriodSource,
    pub count: i64,
    pub sum: Decimal,
}

impl PeriodSum {
    pub fn base() -> Self {
        Self {
            source: PeriodSource::Base,
            count: 1,
            sum: Decimal::ONE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Interval {
    Daily,
    Weekly,
    Monthly,
}

impl Interval {
    /// Days before the end date at which the trailing window starts.
    pub fn trailing_days(&self) -> i64 {
        match self {
            Interval::Daily => 0,
            Interval::Weekly => 6,
            Interval::Monthly => 30,
        }
    }
}

impl Display for Interval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Interval::Daily => "daily",
                Interval::Weekly => "weekly",
                Interval::Monthly => "monthly",
            }
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntervalRate {
    pub interval: Interval,
    pub exchange_rate: String,
}

impl IntervalRate {
    pub fn new(interval: Interval, rate: Decimal) -> Self {
        Self {
            interval,
            exchange_rate: rate.to_string(),
        }
    }
}
