use super::ui;
use crate::manager::ExchangeRateManager;
use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use comfy_table::Cell;
use rust_decimal::Decimal;

fn currency(manager: &ExchangeRateManager, code: &str) -> Result<String> {
    let code = code.trim().to_uppercase();
    if code != manager.base_currency() && !manager.supported_currencies().contains(&code) {
        bail!("Unsupported currency '{code}'");
    }
    Ok(code)
}

fn print_rate(label: &str, from: &str, to: &str, rate: Option<Decimal>) {
    match rate {
        Some(rate) => println!(
            "{label}: 1 {from} = {} {to}",
            ui::style_text(&rate.to_string(), ui::StyleType::Value)
        ),
        None => println!(
            "{label}: {}",
            ui::style_text("exchange rate not available", ui::StyleType::Error)
        ),
    }
}

pub async fn show_rate(
    manager: &ExchangeRateManager,
    from: &str,
    to: &str,
    date: Option<NaiveDate>,
) -> Result<()> {
    let from = currency(manager, from)?;
    let to = currency(manager, to)?;
    let date = date.unwrap_or_else(|| manager.today());

    let rate = match manager.get_exchange_rate_by_date(date, &from, &to).await {
        Ok(rate) => Some(rate),
        Err(e) if e.is_unavailable() => None,
        Err(e) => return Err(e).context("Failed to get exchange rate"),
    };
    print_rate(&date.to_string(), &from, &to, rate);
    Ok(())
}

pub async fn show_average(
    manager: &ExchangeRateManager,
    from: &str,
    to: &str,
    start_date: NaiveDate,
    end_date: NaiveDate,
) -> Result<()> {
    if start_date > end_date {
        bail!("Start date {start_date} is after end date {end_date}");
    }
    let from = currency(manager, from)?;
    let to = currency(manager, to)?;

    let rate = match manager
        .get_average_exchange_rate_by_dates(start_date, end_date, &from, &to)
        .await
    {
        Ok(rate) => rate,
        Err(e) if e.is_unavailable() => None,
        Err(e) => return Err(e).context("Failed to get average exchange rate"),
    };
    print_rate(&format!("{start_date} to {end_date}"), &from, &to, rate);
    Ok(())
}

pub async fn show_intervals(
    manager: &ExchangeRateManager,
    from: &str,
    to: &str,
    date: Option<NaiveDate>,
) -> Result<()> {
    let from = currency(manager, from)?;
    let to = currency(manager, to)?;
    let date = date.unwrap_or_else(|| manager.today());

    let intervals = manager
        .get_exchange_rate_in_intervals_by_date(date, &from, &to)
        .await
        .context("Failed to get interval rates")?;

    println!(
        "\n{} {from} to {to} on {date}",
        ui::style_text("Exchange rates", ui::StyleType::Title)
    );
    if intervals.is_empty() {
        println!(
            "{}",
            ui::style_text("exchange rate not available", ui::StyleType::Subtle)
        );
        return Ok(());
    }

    let mut table = ui::new_styled_table();
    table.set_header(vec![ui::header_cell("Interval"), ui::header_cell("Rate")]);
    for interval in &intervals {
        table.add_row(vec![
            Cell::new(interval.interval.to_string()),
            ui::optional_cell(Some(&interval.exchange_rate), |r| r.clone()),
        ]);
    }
    println!("{table}");
    Ok(())
}
