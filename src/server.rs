//! Read-only HTTP query API over the exchange rate manager.

use anyhow::{Context, Result};
use axum::{
    Json, Router,
    extract::{Query, Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{Instrument, error, info, info_span, warn};
use uuid::Uuid;

use crate::core::error::RateError;
use crate::core::rate::IntervalRate;
use crate::manager::ExchangeRateManager;

type SharedManager = Arc<ExchangeRateManager>;

pub enum ApiError {
    InvalidParam(String),
    MissingParam(&'static str),
    Internal(RateError),
}

impl From<RateError> for ApiError {
    fn from(err: RateError) -> Self {
        ApiError::Internal(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorResponse {
            error: String,
            #[serde(skip_serializing_if = "Option::is_none")]
            trace_id: Option<String>,
        }

        let (status, error, trace_id) = match self {
            ApiError::InvalidParam(msg) => {
                warn!(error = %msg, "Invalid parameter in API request");
                (StatusCode::BAD_REQUEST, msg, None)
            }
            ApiError::MissingParam(name) => {
                warn!(param = name, "Missing parameter in API request");
                (
                    StatusCode::BAD_REQUEST,
                    format!("Missing parameter '{name}'"),
                    None,
                )
            }
            ApiError::Internal(e) => {
                let trace_id = Uuid::new_v4().to_string();
                error!(%trace_id, error = %e, "API request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                    Some(trace_id),
                )
            }
        };

        (status, Json(ErrorResponse { error, trace_id })).into_response()
    }
}

fn required<'a>(value: &'a Option<String>, name: &'static str) -> Result<&'a str, ApiError> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or(ApiError::MissingParam(name))
}

fn parse_date(value: &str, name: &str) -> Result<NaiveDate, ApiError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| {
        ApiError::InvalidParam(format!(
            "Invalid value '{value}' of parameter '{name}', expected YYYY-MM-DD"
        ))
    })
}

fn parse_currency(
    manager: &ExchangeRateManager,
    value: &str,
    name: &str,
) -> Result<String, ApiError> {
    let currency = value.to_uppercase();
    if !manager.supported_currencies().contains(&currency) && currency != manager.base_currency()
    {
        return Err(ApiError::InvalidParam(format!(
            "Unsupported currency '{value}' in parameter '{name}'"
        )));
    }
    Ok(currency)
}

fn optional_date(
    manager: &ExchangeRateManager,
    value: &Option<String>,
    name: &str,
) -> Result<NaiveDate, ApiError> {
    match value.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
        Some(v) => parse_date(v, name),
        None => Ok(manager.today()),
    }
}

/// Unavailable rates are a regular `null` result.
fn unavailable_as_none(result: Result<Decimal, RateError>) -> Result<Option<Decimal>, ApiError> {
    match result {
        Ok(rate) => Ok(Some(rate)),
        Err(e) if e.is_unavailable() => {
            info!(error = %e, "Exchange rate not available");
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

#[derive(Debug, Deserialize)]
pub struct RateQuery {
    pub date: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct RateResponse {
    pub date: NaiveDate,
    pub from_currency: String,
    pub to_currency: String,
    pub exchange_rate: Option<Decimal>,
}

async fn get_rate(
    State(manager): State<SharedManager>,
    Query(query): Query<RateQuery>,
) -> Result<Json<RateResponse>, ApiError> {
    let date = optional_date(&manager, &query.date, "date")?;
    let from = parse_currency(&manager, required(&query.from, "from")?, "from")?;
    let to = parse_currency(&manager, required(&query.to, "to")?, "to")?;

    let exchange_rate =
        unavailable_as_none(manager.get_exchange_rate_by_date(date, &from, &to).await)?;
    Ok(Json(RateResponse {
        date,
        from_currency: from,
        to_currency: to,
        exchange_rate,
    }))
}

#[derive(Debug, Deserialize)]
pub struct RangeQuery {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct RangeResponse {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub from_currency: String,
    pub to_currency: String,
    pub exchange_rate: Option<Decimal>,
}

async fn get_range(
    State(manager): State<SharedManager>,
    Query(query): Query<RangeQuery>,
) -> Result<Json<RangeResponse>, ApiError> {
    let start_date = parse_date(required(&query.start_date, "start_date")?, "start_date")?;
    let end_date = parse_date(required(&query.end_date, "end_date")?, "end_date")?;
    if start_date > end_date {
        return Err(ApiError::InvalidParam(format!(
            "start_date {start_date} is after end_date {end_date}"
        )));
    }
    let from = parse_currency(&manager, required(&query.from, "from")?, "from")?;
    let to = parse_currency(&manager, required(&query.to, "to")?, "to")?;

    let exchange_rate = match manager
        .get_average_exchange_rate_by_dates(start_date, end_date, &from, &to)
        .await
    {
        Ok(rate) => rate,
        Err(e) if e.is_unavailable() => {
            info!(error = %e, "Average exchange rate not available");
            None
        }
        Err(e) => return Err(e.into()),
    };
    Ok(Json(RangeResponse {
        start_date,
        end_date,
        from_currency: from,
        to_currency: to,
        exchange_rate,
    }))
}

async fn get_intervals(
    State(manager): State<SharedManager>,
    Query(query): Query<RateQuery>,
) -> Result<Json<Vec<IntervalRate>>, ApiError> {
    let date = optional_date(&manager, &query.date, "date")?;
    let from = parse_currency(&manager, required(&query.from, "from")?, "from")?;
    let to = parse_currency(&manager, required(&query.to, "to")?, "to")?;

    let intervals = manager
        .get_exchange_rate_in_intervals_by_date(date, &from, &to)
        .await?;
    Ok(Json(intervals))
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Wraps every request in a span carrying a fresh `flow_id`.
async fn flow_span(request: Request, next: Next) -> Response {
    let span = info_span!(
        "request",
        flow_id = %Uuid::new_v4(),
        method = %request.method(),
        uri = %request.uri(),
    );
    async move {
        info!("Received API request");
        let response = next.run(request).await;
        info!(status = response.status().as_u16(), "Completed API request");
        response
    }
    .instrument(span)
    .await
}

pub fn router(manager: SharedManager) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/rate", get(get_rate))
        .route("/range", get(get_range))
        .route("/intervals", get(get_intervals))
        .layer(middleware::from_fn(flow_span))
        .with_state(manager)
}

pub async fn serve(manager: SharedManager, host: &str, port: u16) -> Result<()> {
    let addr = format!("{host}:{port}");
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!(%addr, "Serving exchange rates");

    axum::serve(listener, router(manager))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}
