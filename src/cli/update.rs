use super::ui;
use crate::manager::{ExchangeRateManager, UpdateOutcome, UpdateReport};
use crate::providers::ProviderRegistry;
use anyhow::{Result, bail};
use chrono::NaiveDate;
use comfy_table::Cell;
use tracing::info;

/// Fetches the rates of `date` (today when absent) from the selected
/// providers and stores them.
pub async fn run(
    manager: &ExchangeRateManager,
    registry: &ProviderRegistry,
    date: Option<NaiveDate>,
    include: &[String],
    exclude: &[String],
) -> Result<()> {
    let providers = registry.select(include, exclude)?;
    if providers.is_empty() {
        bail!("No providers left to update after filtering");
    }
    let date = manager.future_date_to_today(date.unwrap_or_else(|| manager.today()));
    info!(%date, providers = providers.len(), "Updating exchange rates");

    let spinner = ui::new_spinner(&format!("Updating rates of {date}"));
    let report = manager.update_all_rates_by_date(date, &providers).await;
    spinner.finish_and_clear();

    println!(
        "\nUpdate of {}",
        ui::style_text(&date.to_string(), ui::StyleType::Title)
    );
    finish(&report)
}

/// Back-fills every configured provider from `origin_date` to yesterday.
pub async fn run_historical(manager: &ExchangeRateManager, origin_date: NaiveDate) -> Result<()> {
    info!(%origin_date, "Updating historical exchange rates");

    let spinner = ui::new_spinner(&format!("Updating rates since {origin_date}"));
    let result = manager.update_all_historical_rates(origin_date).await;
    spinner.finish_and_clear();

    let report = result?;
    println!(
        "\nHistorical update since {}",
        ui::style_text(&origin_date.to_string(), ui::StyleType::Title)
    );
    finish(&report)
}

fn finish(report: &UpdateReport) -> Result<()> {
    display_report(report);
    if report.has_failures() {
        bail!("Some providers failed to update");
    }
    Ok(())
}

fn display_report(report: &UpdateReport) {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Provider"),
        ui::header_cell("Status"),
        ui::header_cell("Rates"),
    ]);

    for (provider, outcome) in &report.entries {
        let (status, count) = match outcome {
            UpdateOutcome::Stored(count) => (ui::status_cell("stored", true), Some(*count)),
            UpdateOutcome::Empty => (ui::status_cell("no rates", false), None),
            UpdateOutcome::Failed(reason) => (ui::status_cell(reason, false), None),
        };
        table.add_row(vec![
            Cell::new(provider),
            status,
            ui::optional_cell(count, |c| c.to_string()),
        ]);
    }
    println!("{table}");
    println!(
        "Total: {}",
        ui::style_text(&report.stored_total().to_string(), ui::StyleType::Value)
    );
}
