use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::StatusCode;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, error, instrument};

use crate::core::cache::DailyCache;
use crate::core::clock::Clock;
use crate::core::provider::RateProvider;
use crate::core::rate::{CurrencySet, DayRates, HistoricalRates};
use crate::providers::http::{HttpFetcher, to_decimal};
use crate::providers::limit::RequestLimit;

pub const NAME: &str = "grandtrunk";
pub const DEFAULT_BASE_URL: &str = "http://currencies.apps.grandtrunk.net";

/// Daily rates based on Federal Reserve and European Central Bank data,
/// served as plain text. Free for low volumes, answers 503 once the quota is
/// used up.
pub struct GrandTrunkProvider {
    base_url: String,
    base_currency: String,
    http: HttpFetcher,
    limit: RequestLimit,
    supported: DailyCache<CurrencySet>,
    clock: Arc<dyn Clock>,
}

impl GrandTrunkProvider {
    pub fn new(
        base_url: &str,
        base_currency: &str,
        user_agent: &str,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        Ok(GrandTrunkProvider {
            base_url: base_url.trim_end_matches('/').to_string(),
            base_currency: base_currency.to_string(),
            http: HttpFetcher::new(NAME, user_agent)?,
            limit: RequestLimit::monthly(),
            supported: DailyCache::new(),
            clock,
        })
    }

    /// Body of a successful response. A 503 closes the request gate.
    async fn fetch_text(&self, url: &str) -> Option<String> {
        let response = self.http.get(url, &[]).await?;
        if response.status == StatusCode::SERVICE_UNAVAILABLE {
            self.limit.mark_reached(NAME);
            return None;
        }
        if !response.is_success() {
            return None;
        }
        Some(response.body)
    }

    /// Parses `YYYY-MM-DD <rate>` lines of a range response.
    fn parse_range(&self, body: &str, currency: &str, today: NaiveDate) -> Vec<(NaiveDate, Decimal)> {
        let mut rows = Vec::new();
        for record in body.lines().map(str::trim).filter(|r| !r.is_empty()) {
            let Some((date_str, rate_str)) = record.split_once(' ') else {
                error!(provider = NAME, record, "Malformed range record");
                continue;
            };
            let day = match NaiveDate::parse_from_str(date_str, "%Y-%m-%d") {
                Ok(d) => d,
                Err(e) => {
                    error!(provider = NAME, record, error = %e, "Failed to parse range record date");
                    continue;
                }
            };
            if day >= today {
                continue;
            }
            if let Some(rate) = to_decimal(NAME, rate_str, currency) {
                rows.push((day, rate));
            }
        }
        rows
    }
}

#[async_trait]
impl RateProvider for GrandTrunkProvider {
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

    #[instrument(name = "GrandTrunkCurrencies", skip_all, fields(date = %reference_date))]
    async fn get_supported_currencies(&self, reference_date: NaiveDate) -> CurrencySet {
        if let Some(cached) = self.supported.get(reference_date).await {
            return cached;
        }
        if !self.limit.allows(NAME, self.clock.today()) {
            return CurrencySet::new();
        }

        let url = format!("{}/currencies/{}", self.base_url, reference_date);
        let currencies: CurrencySet = match self.fetch_text(&url).await {
            Some(body) => body
                .lines()
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(str::to_string)
                .collect(),
            None => CurrencySet::new(),
        };
        if currencies.is_empty() {
            error!(provider = NAME, "Supported currencies not found");
        } else {
            debug!(provider = NAME, count = currencies.len(), "Supported currencies");
        }

        self.supported.put(reference_date, currencies.clone()).await;
        currencies
    }

    #[instrument(name = "GrandTrunkRate", skip_all, fields(date = %date, currency = %currency))]
    async fn get_by_date(&self, date: NaiveDate, currency: &str) -> Option<Decimal> {
        if !self.limit.allows(NAME, self.clock.today()) {
            return None;
        }
        let url = format!(
            "{}/getrate/{}/{}/{}",
            self.base_url, date, self.base_currency, currency
        );
        let body = self.fetch_text(&url).await?;
        to_decimal(NAME, &body, currency)
    }

    #[instrument(name = "GrandTrunkDay", skip_all, fields(date = %date))]
    async fn get_all_by_date(&self, date: NaiveDate, currencies: &CurrencySet) -> DayRates {
        let mut day_rates = DayRates::new();
        if !self.limit.allows(NAME, self.clock.today()) {
            return day_rates;
        }

        let supported = self.get_supported_currencies(date).await;
        for currency in currencies.intersection(&supported) {
            let url = format!(
                "{}/getrate/{}/{}/{}",
                self.base_url, date, self.base_currency, currency
            );
            match self.fetch_text(&url).await {
                Some(body) => {
                    if let Some(rate) = to_decimal(NAME, &body, currency) {
                        day_rates.insert(currency.clone(), rate);
                    }
                }
                None if self.limit.is_reached() => return DayRates::new(),
                None => continue,
            }
        }
        day_rates
    }

    #[instrument(name = "GrandTrunkHistory", skip_all, fields(origin = %origin_date))]
    async fn get_historical(
        &self,
        origin_date: NaiveDate,
        currencies: &CurrencySet,
    ) -> HistoricalRates {
        let mut historical = HistoricalRates::new();
        let today = self.clock.today();
        if origin_date >= today || !self.limit.allows(NAME, today) {
            return historical;
        }

        for currency in currencies {
            let url = format!(
                "{}/getrange/{}/{}/{}/{}",
                self.base_url, origin_date, today, self.base_currency, currency
            );
            let body = match self.fetch_text(&url).await {
                Some(b) => b,
                None if self.limit.is_reached() => return HistoricalRates::new(),
                None => continue,
            };
            for (day, rate) in self.parse_range(&body, currency, today) {
                historical.entry(day).or_default().insert(currency.clone(), rate);
            }
        }
        historical
    }
}
