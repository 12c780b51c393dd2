use chrono::{Days, NaiveDate};
use rust_decimal::Decimal;
use tracing::{debug, error, info, instrument, warn};

use super::ExchangeRateManager;
use super::reconcile::pick_the_best;
use crate::core::error::RateError;
use crate::core::rate::{ExchangeRate, Interval, IntervalRate, PeriodSum};

/// `to_mean / from_mean`, written as a product with the reciprocal.
///
/// Quotients are normalized so the product carries the scale of its
/// factors, e.g. `20 * 0.1 = 2.0`.
fn ratio_of_means(from: &PeriodSum, to: &PeriodSum) -> Option<Decimal> {
    let from_mean = from.sum.checked_div(Decimal::from(from.count))?.normalize();
    let to_mean = to.sum.checked_div(Decimal::from(to.count))?.normalize();
    let reciprocal = Decimal::ONE.checked_div(from_mean)?.normalize();
    to_mean.checked_mul(reciprocal)
}

impl ExchangeRateManager {
    fn best_rate(
        &self,
        rates: &[ExchangeRate],
        currency: &str,
        date: NaiveDate,
    ) -> Result<Decimal, RateError> {
        let candidates: Vec<Decimal> = rates.iter().map(|r| r.rate).collect();
        let best = pick_the_best(&candidates).map_err(|_| RateError::MissingRate {
            currency: currency.to_string(),
            date,
        })?;
        debug!(currency, %date, %best, ?candidates, "Picked rate");
        Ok(best)
    }

    /// Conversion rate `from → to` on `date`. Future dates are clamped to
    /// today.
    #[instrument(skip(self))]
    pub async fn get_exchange_rate_by_date(
        &self,
        date: NaiveDate,
        from_currency: &str,
        to_currency: &str,
    ) -> Result<Decimal, RateError> {
        let date = self.future_date_to_today(date);
        let from_rates = self.get_or_update_rate_by_date(date, from_currency).await?;
        let to_rates = self.get_or_update_rate_by_date(date, to_currency).await?;

        let from_rate = self.best_rate(&from_rates, from_currency, date)?;
        let to_rate = self.best_rate(&to_rates, to_currency, date)?;
        if from_rate.is_zero() {
            return Err(RateError::ZeroRate {
                currency: from_currency.to_string(),
                date,
            });
        }
        to_rate
            .checked_div(from_rate)
            .map(|rate| rate.normalize())
            .ok_or_else(|| RateError::MissingRate {
                currency: to_currency.to_string(),
                date,
            })
    }

    async fn period_sums(
        &self,
        start_date: NaiveDate,
        end_date: NaiveDate,
        currency: &str,
    ) -> Result<Vec<PeriodSum>, RateError> {
        if currency == self.base_currency {
            return Ok(vec![PeriodSum::base()]);
        }
        Ok(self
            .store
            .get_sum_of_rates_in_period(start_date, end_date, currency)
            .await?)
    }

    /// Average conversion rate over the inclusive period, from stored rates
    /// only.
    ///
    /// The per-provider sums of both currencies are paired by position, so
    /// the first provider of one list meets the first provider of the other
    /// regardless of identity. The first pair with data on both sides wins.
    #[instrument(skip(self))]
    pub async fn get_average_exchange_rate_by_dates(
        &self,
        start_date: NaiveDate,
        end_date: NaiveDate,
        from_currency: &str,
        to_currency: &str,
    ) -> Result<Option<Decimal>, RateError> {
        let today = self.clock.today();
        if start_date > today {
            warn!(%start_date, %today, "Period starts in the future, using today's rate");
            return self
                .get_exchange_rate_by_date(today, from_currency, to_currency)
                .await
                .map(Some);
        }

        let days = (end_date - start_date).num_days().abs() + 1;
        let from_sums = self.period_sums(start_date, end_date, from_currency).await?;
        let to_sums = self.period_sums(start_date, end_date, to_currency).await?;

        for (from_sum, to_sum) in from_sums.iter().zip(&to_sums) {
            info!(
                currency = from_currency,
                source = %from_sum.source,
                count = from_sum.count,
                sum = %from_sum.sum,
                "Sum of rates in period"
            );
            info!(
                currency = to_currency,
                source = %to_sum.source,
                count = to_sum.count,
                sum = %to_sum.sum,
                "Sum of rates in period"
            );
            for (currency, sum) in [(from_currency, from_sum), (to_currency, to_sum)] {
                if currency != self.base_currency && sum.count != days {
                    warn!(
                        currency,
                        source = %sum.source,
                        available = sum.count,
                        expected = days,
                        "Rates missing for some days of the period"
                    );
                }
            }

            let has_data = |s: &PeriodSum| s.count > 0 && !s.sum.is_zero();
            if has_data(from_sum) && has_data(to_sum) {
                if let Some(rate) = ratio_of_means(from_sum, to_sum) {
                    return Ok(Some(rate));
                }
            }
            error!(
                from = from_currency,
                to = to_currency,
                from_source = %from_sum.source,
                to_source = %to_sum.source,
                "No usable rates for average"
            );
        }

        error!(
            from = from_currency,
            to = to_currency,
            %start_date,
            %end_date,
            "Average exchange rate not available"
        );
        Ok(None)
    }

    /// Daily rate plus 7 and 31 day trailing averages ending at `date`.
    /// Empty when any of the three is unavailable.
    #[instrument(skip(self))]
    pub async fn get_exchange_rate_in_intervals_by_date(
        &self,
        date: NaiveDate,
        from_currency: &str,
        to_currency: &str,
    ) -> Result<Vec<IntervalRate>, RateError> {
        let mut intervals = Vec::with_capacity(3);
        for interval in [Interval::Daily, Interval::Weekly, Interval::Monthly] {
            let result = match interval {
                Interval::Daily => self
                    .get_exchange_rate_by_date(date, from_currency, to_currency)
                    .await
                    .map(Some),
                _ => {
                    let start_date = date
                        .checked_sub_days(Days::new(interval.trailing_days() as u64))
                        .unwrap_or(date);
                    self.get_average_exchange_rate_by_dates(
                        start_date,
                        date,
                        from_currency,
                        to_currency,
                    )
                    .await
                }
            };
            match result {
                Ok(Some(rate)) => intervals.push(IntervalRate::new(interval, rate)),
                Ok(None) => return Ok(Vec::new()),
                Err(e) if e.is_unavailable() => {
                    warn!(%interval, error = %e, "Interval rate not available");
                    return Ok(Vec::new());
                }
                Err(e) => return Err(e),
            }
        }
        Ok(intervals)
    }
}
