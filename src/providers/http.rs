use anyhow::Result;
use reqwest::{StatusCode, Url};
use rust_decimal::Decimal;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, error};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
const SECRET_PARAMS: &[&str] = &["access_key"];

pub struct HttpResponse {
    pub status: StatusCode,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

/// Shared GET transport of the rate providers. Transport failures are logged
/// and reported as `None`; any HTTP response is handed back to the caller.
pub struct HttpFetcher {
    provider: &'static str,
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(provider: &'static str, user_agent: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .connect_timeout(REQUEST_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self { provider, client })
    }

    pub async fn get(&self, url: &str, params: &[(&str, &str)]) -> Option<HttpResponse> {
        let shown = redact(params);
        let parsed = if params.is_empty() {
            Url::parse(url)
        } else {
            Url::parse_with_params(url, params)
        };
        let request_url = match parsed {
            Ok(u) => u,
            Err(e) => {
                error!(provider = self.provider, url, params = ?shown, error = %e, "Invalid request URL");
                return None;
            }
        };

        debug!(provider = self.provider, url, params = ?shown, "Requesting rates");
        let response = match self.client.get(request_url).send().await {
            Ok(r) => r,
            Err(e) => {
                error!(provider = self.provider, url, params = ?shown, error = %e, "Request failed");
                return None;
            }
        };

        let status = response.status();
        let body = match response.text().await {
            Ok(b) => b,
            Err(e) => {
                error!(provider = self.provider, url, params = ?shown, error = %e, "Failed to read response body");
                return None;
            }
        };
        if !status.is_success() {
            error!(provider = self.provider, url, params = ?shown, %status, body = %body, "Unexpected response status");
        }
        Some(HttpResponse { status, body })
    }
}

fn redact(params: &[(&str, &str)]) -> Vec<(String, String)> {
    params
        .iter()
        .map(|(k, v)| {
            let value = if SECRET_PARAMS.contains(k) { "***" } else { *v };
            (k.to_string(), value.to_string())
        })
        .collect()
}

/// Parses a textual rate. Unparseable or negative values are logged and
/// treated as absent.
pub fn to_decimal(provider: &str, value: &str, currency: &str) -> Option<Decimal> {
    let trimmed = value.trim();
    let parsed = Decimal::from_str(trimmed).or_else(|_| Decimal::from_scientific(trimmed));
    match parsed {
        Ok(rate) if rate.is_sign_negative() && !rate.is_zero() => {
            error!(provider, currency, value = trimmed, "Negative exchange rate ignored");
            None
        }
        Ok(rate) => Some(rate),
        Err(e) => {
            error!(provider, currency, value = trimmed, error = %e, "Failed to parse exchange rate");
            None
        }
    }
}

/// JSON rates arrive as numbers or, from some sources, as strings.
pub fn json_to_decimal(provider: &str, value: &serde_json::Value, currency: &str) -> Option<Decimal> {
    match value {
        serde_json::Value::Number(n) => to_decimal(provider, &n.to_string(), currency),
        serde_json::Value::String(s) => to_decimal(provider, s, currency),
        other => {
            error!(provider, currency, value = %other, "Exchange rate is not a number");
            None
        }
    }
}
