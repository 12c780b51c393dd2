use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, instrument, warn};

use crate::core::cache::DailyCache;
use crate::core::clock::Clock;
use crate::core::provider::RateProvider;
use crate::core::rate::{CurrencySet, DayRates, HistoricalRates};
use crate::providers::http::{HttpFetcher, json_to_decimal};
use crate::providers::limit::RequestLimit;

pub const NAME: &str = "fixer.io";
pub const DEFAULT_BASE_URL: &str = "http://data.fixer.io/api";

/// Error code of an exhausted monthly quota.
const LIMIT_REACHED_CODE: i64 = 104;

/// Paid JSON API quoting against EUR. Rates are rebased onto the configured
/// base currency using the base currency quote of the same response.
pub struct FixerProvider {
    base_url: String,
    base_currency: String,
    access_key: String,
    http: HttpFetcher,
    limit: RequestLimit,
    supported: DailyCache<CurrencySet>,
    clock: Arc<dyn Clock>,
}

#[derive(Deserialize, Debug)]
struct FixerError {
    code: i64,
    #[serde(rename = "type")]
    kind: Option<String>,
}

#[derive(Deserialize, Debug)]
struct FixerResponse {
    success: bool,
    error: Option<FixerError>,
    #[serde(default)]
    rates: HashMap<String, serde_json::Value>,
    #[serde(default)]
    symbols: HashMap<String, serde_json::Value>,
}

impl FixerProvider {
    pub fn new(
        base_url: &str,
        access_key: &str,
        base_currency: &str,
        user_agent: &str,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        Ok(FixerProvider {
            base_url: base_url.trim_end_matches('/').to_string(),
            base_currency: base_currency.to_string(),
            access_key: access_key.to_string(),
            http: HttpFetcher::new(NAME, user_agent)?,
            limit: RequestLimit::monthly(),
            supported: DailyCache::new(),
            clock,
        })
    }

    /// A successful payload. Failure payloads are logged, and the quota
    /// error closes the request gate.
    async fn fetch(&self, url: &str, params: &[(&str, &str)]) -> Option<FixerResponse> {
        let response = self.http.get(url, params).await?;
        if !response.is_success() {
            return None;
        }
        let payload: FixerResponse = match serde_json::from_str(&response.body) {
            Ok(p) => p,
            Err(e) => {
                error!(provider = NAME, url, error = %e, "Failed to parse JSON response");
                return None;
            }
        };
        if !payload.success {
            let (code, kind) = payload
                .error
                .as_ref()
                .map(|e| (e.code, e.kind.clone().unwrap_or_default()))
                .unwrap_or_default();
            if code == LIMIT_REACHED_CODE {
                self.limit.mark_reached(NAME);
            } else {
                error!(provider = NAME, url, code, kind = %kind, "Request was not successful");
            }
            return None;
        }
        Some(payload)
    }
}

#[async_trait]
impl RateProvider for FixerProvider {
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

    #[instrument(name = "FixerCurrencies", skip_all, fields(date = %reference_date))]
    async fn get_supported_currencies(&self, reference_date: NaiveDate) -> CurrencySet {
        if let Some(cached) = self.supported.get(reference_date).await {
            return cached;
        }
        if !self.limit.allows(NAME, self.clock.today()) {
            return CurrencySet::new();
        }

        let url = format!("{}/symbols", self.base_url);
        let currencies: CurrencySet = self
            .fetch(&url, &[("access_key", self.access_key.as_str())])
            .await
            .map(|payload| payload.symbols.into_keys().collect())
            .unwrap_or_default();
        if currencies.is_empty() {
            error!(provider = NAME, "Supported currencies not found");
        } else {
            debug!(provider = NAME, count = currencies.len(), "Supported currencies");
        }

        self.supported.put(reference_date, currencies.clone()).await;
        currencies
    }

    #[instrument(name = "FixerRate", skip_all, fields(date = %date, currency = %currency))]
    async fn get_by_date(&self, date: NaiveDate, currency: &str) -> Option<Decimal> {
        let requested = CurrencySet::from([currency.to_string()]);
        self.get_all_by_date(date, &requested).await.remove(currency)
    }

    #[instrument(name = "FixerDay", skip_all, fields(date = %date))]
    async fn get_all_by_date(&self, date: NaiveDate, currencies: &CurrencySet) -> DayRates {
        let mut day_rates = DayRates::new();
        if !self.limit.allows(NAME, self.clock.today()) {
            return day_rates;
        }

        let mut symbols: CurrencySet = currencies.clone();
        symbols.insert(self.base_currency.clone());
        let symbols = symbols.into_iter().collect::<Vec<_>>().join(",");
        let url = format!("{}/{}", self.base_url, date);
        let Some(payload) = self
            .fetch(
                &url,
                &[("access_key", self.access_key.as_str()), ("symbols", symbols.as_str())],
            )
            .await
        else {
            return day_rates;
        };

        let base_rate = payload
            .rates
            .get(&self.base_currency)
            .and_then(|v| json_to_decimal(NAME, v, &self.base_currency));
        let base_rate = match base_rate {
            Some(r) if !r.is_zero() => r,
            _ => {
                warn!(provider = NAME, %date, base = %self.base_currency, "Base currency rate missing, day skipped");
                return day_rates;
            }
        };

        for currency in currencies {
            let Some(value) = payload.rates.get(currency) else {
                continue;
            };
            let Some(rate) = json_to_decimal(NAME, value, currency) else {
                continue;
            };
            match rate.checked_div(base_rate) {
                Some(rebased) => {
                    day_rates.insert(currency.clone(), rebased);
                }
                None => {
                    error!(provider = NAME, currency = %currency, %rate, %base_rate, "Rate conversion overflowed")
                }
            }
        }
        day_rates
    }

    #[instrument(name = "FixerHistory", skip_all, fields(origin = %origin_date))]
    async fn get_historical(
        &self,
        origin_date: NaiveDate,
        currencies: &CurrencySet,
    ) -> HistoricalRates {
        let mut historical = HistoricalRates::new();
        let today = self.clock.today();

        for day in origin_date.iter_days().take_while(|d| *d < today) {
            let day_rates = self.get_all_by_date(day, currencies).await;
            if self.limit.is_reached() {
                break;
            }
            if !day_rates.is_empty() {
                historical.insert(day, day_rates);
            }
        }
        historical
    }
}
