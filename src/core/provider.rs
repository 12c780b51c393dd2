//! Rate provider abstraction

use crate::core::rate::{CurrencySet, DayRates, HistoricalRates};
use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;

/// An external source of exchange rates.
///
/// Implementations never fail past this boundary: network errors, bad
/// statuses, malformed payloads and exhausted quotas all degrade to an empty
/// or absent result and are logged by the provider itself. Every returned
/// rate is expressed against `base_currency()`.
#[async_trait]
pub trait RateProvider: Send + Sync {
    fn name(&self) -> &str;

    fn base_currency(&self) -> &str;

    /// Whether the source enforces a request quota.
    fn has_request_limit(&self) -> bool;

    /// Whether the quota was exhausted and calls are currently skipped.
    fn request_limit_reached(&self) -> bool;

    /// Currencies the source can quote as of `reference_date`. Cached for the
    /// most recently asked date.
    async fn get_supported_currencies(&self, reference_date: NaiveDate) -> CurrencySet;

    async fn get_by_date(&self, date: NaiveDate, currency: &str) -> Option<Decimal>;

    /// Currencies missing from the result are unavailable for that day.
    async fn get_all_by_date(&self, date: NaiveDate, currencies: &CurrencySet) -> DayRates;

    /// Rates from `origin_date` up to yesterday. Today is never included.
    async fn get_historical(
        &self,
        origin_date: NaiveDate,
        currencies: &CurrencySet,
    ) -> HistoricalRates;
}
