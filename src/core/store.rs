//! Storage collaborator used by the exchange rate manager.

use crate::core::error::StoreError;
use crate::core::rate::{ExchangeRate, NewRate, PeriodSum, ProviderDescriptor};
use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;

/// Record store for rates and provider descriptors.
///
/// At most one rate exists per (date, currency, provider). Inserting a rate
/// for a taken key is a no-op.
#[async_trait]
pub trait RateStore: Send + Sync {
    /// All stored rates of `currency` on `date`, ordered by provider id.
    async fn get_rates_by_date_currency(
        &self,
        date: NaiveDate,
        currency: &str,
    ) -> Result<Vec<ExchangeRate>, StoreError>;

    async fn get_rate_by_date_currency_provider(
        &self,
        date: NaiveDate,
        currency: &str,
        provider_name: &str,
    ) -> Result<Option<ExchangeRate>, StoreError>;

    /// Inserts a rate and returns the stored record. When a record already
    /// exists for the key, that record is returned unchanged.
    async fn insert_new_rate(
        &self,
        date: NaiveDate,
        provider: &ProviderDescriptor,
        currency: &str,
        rate: Decimal,
    ) -> Result<ExchangeRate, StoreError>;

    /// Bulk insert, skipping rows whose key is already taken.
    async fn insert_exchange_rate_to_db(&self, records: &[NewRate]) -> Result<(), StoreError>;

    async fn get_or_create_provider_by_name(
        &self,
        name: &str,
    ) -> Result<ProviderDescriptor, StoreError>;

    /// Day count and rate sum per provider over the inclusive range, ordered
    /// by provider id. Providers without any record in the range are omitted.
    async fn get_sum_of_rates_in_period(
        &self,
        start_date: NaiveDate,
        end_date: NaiveDate,
        currency: &str,
    ) -> Result<Vec<PeriodSum>, StoreError>;
}
