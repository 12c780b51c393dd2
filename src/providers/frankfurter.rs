use anyhow::Result;
use async_trait::async_trait;
use chrono::{Days, NaiveDate};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, error, instrument};

use crate::core::cache::DailyCache;
use crate::core::clock::Clock;
use crate::core::provider::RateProvider;
use crate::core::rate::{CurrencySet, DayRates, HistoricalRates};
use crate::providers::http::{HttpFetcher, json_to_decimal};
use crate::providers::limit::RequestLimit;

pub const NAME: &str = "frankfurter";
pub const DEFAULT_BASE_URL: &str = "https://api.frankfurter.app";

/// European Central Bank reference rates. An unpublished date is answered
/// with the closest earlier publication.
pub struct FrankfurterProvider {
    base_url: String,
    base_currency: String,
    http: HttpFetcher,
    limit: RequestLimit,
    supported: DailyCache<CurrencySet>,
    clock: Arc<dyn Clock>,
}

#[derive(Deserialize, Debug)]
struct DayResponse {
    rates: HashMap<String, serde_json::Value>,
}

#[derive(Deserialize, Debug)]
struct RangeResponse {
    rates: BTreeMap<NaiveDate, HashMap<String, serde_json::Value>>,
}

impl FrankfurterProvider {
    pub fn new(
        base_url: &str,
        base_currency: &str,
        user_agent: &str,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        Ok(FrankfurterProvider {
            base_url: base_url.trim_end_matches('/').to_string(),
            base_currency: base_currency.to_string(),
            http: HttpFetcher::new(NAME, user_agent)?,
            limit: RequestLimit::unlimited(),
            supported: DailyCache::new(),
            clock,
        })
    }

    async fn fetch<T: for<'de> Deserialize<'de>>(
        &self,
        url: &str,
        params: &[(&str, &str)],
    ) -> Option<T> {
        let response = self.http.get(url, params).await?;
        if !response.is_success() {
            return None;
        }
        match serde_json::from_str(&response.body) {
            Ok(payload) => Some(payload),
            Err(e) => {
                error!(provider = NAME, url, error = %e, "Failed to parse JSON response");
                None
            }
        }
    }

    /// Requested currencies other than the base, comma separated. The API
    /// rejects a request converting a currency to itself.
    fn targets(&self, currencies: &CurrencySet) -> String {
        currencies
            .iter()
            .filter(|c| **c != self.base_currency)
            .cloned()
            .collect::<Vec<_>>()
            .join(",")
    }

    fn day_rates(
        &self,
        rates: &HashMap<String, serde_json::Value>,
        currencies: &CurrencySet,
    ) -> DayRates {
        let mut day_rates = DayRates::new();
        for currency in currencies {
            if *currency == self.base_currency {
                day_rates.insert(currency.clone(), Decimal::ONE);
                continue;
            }
            if let Some(rate) = rates
                .get(currency)
                .and_then(|v| json_to_decimal(NAME, v, currency))
            {
                day_rates.insert(currency.clone(), rate);
            }
        }
        day_rates
    }
}

#[async_trait]
impl RateProvider for FrankfurterProvider {
    fn name(&self) -> &str {
        NAME
    }

    fn base_currency(&self) -> &str {
        &self.base_currency
    }

    fn has_request_limit(&self) -> bool {
        self.limit.is_enabled()
    }

    fn request_limit_reached(&self) -> bool {
        self.limit.is_reached()
    }

    #[instrument(name = "FrankfurterCurrencies", skip_all, fields(date = %reference_date))]
    async fn get_supported_currencies(&self, reference_date: NaiveDate) -> CurrencySet {
        if let Some(cached) = self.supported.get(reference_date).await {
            return cached;
        }

        let url = format!("{}/currencies", self.base_url);
        let currencies: CurrencySet = self
            .fetch::<HashMap<String, serde_json::Value>>(&url, &[])
            .await
            .map(|names| names.into_keys().collect())
            .unwrap_or_default();
        if currencies.is_empty() {
            error!(provider = NAME, "Supported currencies not found");
        } else {
            debug!(provider = NAME, count = currencies.len(), "Supported currencies");
        }

        self.supported.put(reference_date, currencies.clone()).await;
        currencies
    }

    #[instrument(name = "FrankfurterRate", skip_all, fields(date = %date, currency = %currency))]
    async fn get_by_date(&self, date: NaiveDate, currency: &str) -> Option<Decimal> {
        let requested = CurrencySet::from([currency.to_string()]);
        self.get_all_by_date(date, &requested).await.remove(currency)
    }

    #[instrument(name = "FrankfurterDay", skip_all, fields(date = %date))]
    async fn get_all_by_date(&self, date: NaiveDate, currencies: &CurrencySet) -> DayRates {
        let targets = self.targets(currencies);
        if targets.is_empty() {
            return self.day_rates(&HashMap::new(), currencies);
        }

        let url = format!("{}/{}", self.base_url, date);
        let params = [("from", self.base_currency.as_str()), ("to", targets.as_str())];
        match self.fetch::<DayResponse>(&url, &params).await {
            Some(payload) => self.day_rates(&payload.rates, currencies),
            None => DayRates::new(),
        }
    }

    #[instrument(name = "FrankfurterHistory", skip_all, fields(origin = %origin_date))]
    async fn get_historical(
        &self,
        origin_date: NaiveDate,
        currencies: &CurrencySet,
    ) -> HistoricalRates {
        let mut historical = HistoricalRates::new();
        let today = self.clock.today();
        let Some(yesterday) = today.checked_sub_days(Days::new(1)) else {
            return historical;
        };
        let targets = self.targets(currencies);
        if origin_date > yesterday || targets.is_empty() {
            return historical;
        }

        let url = format!("{}/{}..{}", self.base_url, origin_date, yesterday);
        let params = [("from", self.base_currency.as_str()), ("to", targets.as_str())];
        let Some(payload) = self.fetch::<RangeResponse>(&url, &params).await else {
            return historical;
        };
        for (day, rates) in payload.rates {
            if day < origin_date || day >= today {
                continue;
            }
            let day_rates = self.day_rates(&rates, currencies);
            if !day_rates.is_empty() {
                historical.insert(day, day_rates);
            }
        }
        historical
    }
}
