use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

use super::ExchangeRateManager;
use crate::core::clock::FixedClock;
use crate::core::error::StoreError;
use crate::core::provider::RateProvider;
use crate::core::rate::{
    CurrencySet, DayRates, ExchangeRate, HistoricalRates, Interval, IntervalRate, NewRate,
    PeriodSource, PeriodSum, ProviderDescriptor,
};
use crate::core::store::RateStore;
use crate::store::MemoryRateStore;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn dec(s: &str) -> Decimal {
    s.parse().unwrap()
}

fn currencies(codes: &[&str]) -> CurrencySet {
    codes.iter().map(|c| c.to_string()).collect()
}

/// Provider answering from a fixed table and counting calls.
struct FakeProvider {
    name: &'static str,
    limited: bool,
    supported: CurrencySet,
    rates: HashMap<(NaiveDate, String), Decimal>,
    day_rates: DayRates,
    historical: HistoricalRates,
    rate_calls: AtomicUsize,
    day_calls: AtomicUsize,
}

impl FakeProvider {
    fn new(name: &'static str) -> Self {
        Self {
            name,
            limited: false,
            supported: currencies(&["CZK", "EUR", "USD"]),
            rates: HashMap::new(),
            day_rates: DayRates::new(),
            historical: HistoricalRates::new(),
            rate_calls: AtomicUsize::new(0),
            day_calls: AtomicUsize::new(0),
        }
    }

    fn limited(mut self) -> Self {
        self.limited = true;
        self
    }

    fn with_rate(mut self, day: NaiveDate, currency: &str, rate: &str) -> Self {
        self.rates.insert((day, currency.to_string()), dec(rate));
        self
    }

    fn with_day_rates(mut self, rates: &[(&str, &str)]) -> Self {
        self.day_rates = rates.iter().map(|(c, r)| (c.to_string(), dec(r))).collect();
        self
    }

    fn with_historical(mut self, day: NaiveDate, rates: &[(&str, &str)]) -> Self {
        self.historical
            .insert(day, rates.iter().map(|(c, r)| (c.to_string(), dec(r))).collect());
        self
    }

    fn rate_calls(&self) -> usize {
        self.rate_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RateProvider for FakeProvider {
    fn name(&self) -> &str {
        self.name
    }

    fn base_currency(&self) -> &str {
        "USD"
    }

    fn has_request_limit(&self) -> bool {
        self.limited
    }

    fn request_limit_reached(&self) -> bool {
        false
    }

    async fn get_supported_currencies(&self, _reference_date: NaiveDate) -> CurrencySet {
        self.supported.clone()
    }

    async fn get_by_date(&self, date: NaiveDate, currency: &str) -> Option<Decimal> {
        self.rate_calls.fetch_add(1, Ordering::SeqCst);
        self.rates.get(&(date, currency.to_string())).copied()
    }

    async fn get_all_by_date(&self, _date: NaiveDate, currencies: &CurrencySet) -> DayRates {
        self.day_calls.fetch_add(1, Ordering::SeqCst);
        self.day_rates
            .iter()
            .filter(|(c, _)| currencies.contains(*c))
            .map(|(c, r)| (c.clone(), *r))
            .collect()
    }

    async fn get_historical(
        &self,
        _origin_date: NaiveDate,
        _currencies: &CurrencySet,
    ) -> HistoricalRates {
        self.historical.clone()
    }
}

/// Memory store counting every call, optionally answering period sums from
/// a table keyed by (start date, currency).
#[derive(Default)]
struct RecordingStore {
    inner: MemoryRateStore,
    calls: AtomicUsize,
    period_sums: Option<HashMap<(NaiveDate, String), Vec<PeriodSum>>>,
    fail_inserts: bool,
}

impl RecordingStore {
    fn with_period_sums(sums: Vec<(NaiveDate, &str, Vec<PeriodSum>)>) -> Self {
        Self {
            period_sums: Some(
                sums.into_iter()
                    .map(|(d, c, s)| ((d, c.to_string()), s))
                    .collect(),
            ),
            ..Self::default()
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn hit(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl RateStore for RecordingStore {
    async fn get_rates_by_date_currency(
        &self,
        date: NaiveDate,
        currency: &str,
    ) -> Result<Vec<ExchangeRate>, StoreError> {
        self.hit();
        self.inner.get_rates_by_date_currency(date, currency).await
    }

    async fn get_rate_by_date_currency_provider(
        &self,
        date: NaiveDate,
        currency: &str,
        provider_name: &str,
    ) -> Result<Option<ExchangeRate>, StoreError> {
        self.hit();
        self.inner
            .get_rate_by_date_currency_provider(date, currency, provider_name)
            .await
    }

    async fn insert_new_rate(
        &self,
        date: NaiveDate,
        provider: &ProviderDescriptor,
        currency: &str,
        rate: Decimal,
    ) -> Result<ExchangeRate, StoreError> {
        self.hit();
        self.inner.insert_new_rate(date, provider, currency, rate).await
    }

    async fn insert_exchange_rate_to_db(&self, records: &[NewRate]) -> Result<(), StoreError> {
        self.hit();
        if self.fail_inserts {
            return Err(StoreError::Backend("disk full".to_string()));
        }
        self.inner.insert_exchange_rate_to_db(records).await
    }

    async fn get_or_create_provider_by_name(
        &self,
        name: &str,
    ) -> Result<ProviderDescriptor, StoreError> {
        self.hit();
        self.inner.get_or_create_provider_by_name(name).await
    }

    async fn get_sum_of_rates_in_period(
        &self,
        start_date: NaiveDate,
        end_date: NaiveDate,
        currency: &str,
    ) -> Result<Vec<PeriodSum>, StoreError> {
        self.hit();
        match &self.period_sums {
            Some(table) => Ok(table
                .get(&(start_date, currency.to_string()))
                .cloned()
                .unwrap_or_default()),
            None => {
                self.inner
                    .get_sum_of_rates_in_period(start_date, end_date, currency)
                    .await
            }
        }
    }
}

/// Counts WARN events seen on the current thread.
#[derive(Clone, Default)]
struct WarnCounter(Arc<AtomicUsize>);

impl WarnCounter {
    fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

impl<S: Subscriber> Layer<S> for WarnCounter {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if *event.metadata().level() == Level::WARN {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }
}

fn as_dyn(providers: &[Arc<FakeProvider>]) -> Vec<Arc<dyn RateProvider>> {
    providers
        .iter()
        .map(|p| p.clone() as Arc<dyn RateProvider>)
        .collect()
}

fn manager(
    store: Arc<dyn RateStore>,
    providers: Vec<Arc<FakeProvider>>,
    today: NaiveDate,
) -> ExchangeRateManager {
    ExchangeRateManager::new(
        store,
        as_dyn(&providers),
        "USD",
        currencies(&["CZK", "EUR", "USD"]),
        Arc::new(FixedClock(today)),
    )
}

fn sum(id: i64, count: i64, total: i64) -> PeriodSum {
    PeriodSum {
        source: PeriodSource::Provider(id),
        count,
        sum: Decimal::from(total),
    }
}

#[tokio::test]
async fn test_base_currency_needs_no_store_or_provider() {
    let today = date(2024, 3, 15);
    let store = Arc::new(RecordingStore::default());
    let provider = Arc::new(FakeProvider::new("grandtrunk"));
    let manager = manager(store.clone(), vec![provider.clone()], today);

    let rates = manager.get_or_update_rate_by_date(today, "USD").await.unwrap();

    assert_eq!(rates, vec![ExchangeRate::base("USD", today)]);
    assert_eq!(store.calls(), 0);
    assert_eq!(provider.rate_calls(), 0);
}

#[tokio::test]
async fn test_today_reuses_yesterdays_record() {
    let today = date(2024, 3, 15);
    let yesterday = date(2024, 3, 14);
    let store = Arc::new(MemoryRateStore::new());
    let descriptor = store.get_or_create_provider_by_name("grandtrunk").await.unwrap();
    store
        .insert_new_rate(yesterday, &descriptor, "EUR", dec("0.91"))
        .await
        .unwrap();

    let provider = Arc::new(FakeProvider::new("grandtrunk").with_rate(today, "EUR", "0.95"));
    let manager = manager(store.clone(), vec![provider.clone()], today);

    let rates = manager.get_or_update_rate_by_date(today, "EUR").await.unwrap();

    assert_eq!(rates.len(), 1);
    assert_eq!(rates[0].rate, dec("0.91"));
    assert_eq!(rates[0].date, yesterday);
    assert_eq!(provider.rate_calls(), 0);
}

#[tokio::test]
async fn test_today_without_yesterday_fetches_and_stores() {
    let today = date(2024, 3, 15);
    let store = Arc::new(MemoryRateStore::new());
    let provider = Arc::new(FakeProvider::new("frankfurter").with_rate(today, "EUR", "0.95"));
    let manager = manager(store.clone(), vec![provider.clone()], today);

    let rates = manager.get_or_update_rate_by_date(today, "EUR").await.unwrap();
    assert_eq!(rates.len(), 1);
    assert_eq!(rates[0].rate, dec("0.95"));
    assert_eq!(rates[0].provider_name(), Some("frankfurter"));

    // A second lookup is answered from the store.
    manager.get_or_update_rate_by_date(today, "EUR").await.unwrap();
    assert_eq!(provider.rate_calls(), 1);
}

#[tokio::test]
async fn test_past_date_skips_limited_provider() {
    let today = date(2024, 3, 15);
    let past = date(2024, 3, 1);
    let limited = Arc::new(
        FakeProvider::new("grandtrunk")
            .limited()
            .with_rate(past, "EUR", "0.90"),
    );
    let unlimited = Arc::new(FakeProvider::new("frankfurter").with_rate(past, "EUR", "0.92"));
    let manager = manager(
        Arc::new(MemoryRateStore::new()),
        vec![limited.clone(), unlimited.clone()],
        today,
    );

    let rates = manager.get_or_update_rate_by_date(past, "EUR").await.unwrap();

    assert_eq!(rates.len(), 1);
    assert_eq!(rates[0].provider_name(), Some("frankfurter"));
    assert_eq!(limited.rate_calls(), 0);
    assert_eq!(unlimited.rate_calls(), 1);
}

#[tokio::test]
async fn test_future_date_skips_limited_provider() {
    let today = date(2024, 3, 15);
    let future = date(2024, 3, 20);
    let limited = Arc::new(
        FakeProvider::new("grandtrunk")
            .limited()
            .with_rate(future, "EUR", "0.90"),
    );
    let manager = manager(Arc::new(MemoryRateStore::new()), vec![limited.clone()], today);

    let rates = manager.get_or_update_rate_by_date(future, "EUR").await.unwrap();

    assert!(rates.is_empty());
    assert_eq!(limited.rate_calls(), 0);
}

#[tokio::test]
async fn test_unsupported_currency_is_not_requested() {
    let today = date(2024, 3, 15);
    let provider = Arc::new(FakeProvider::new("frankfurter"));
    let manager = manager(Arc::new(MemoryRateStore::new()), vec![provider.clone()], today);

    let rates = manager.get_or_update_rate_by_date(today, "JPY").await.unwrap();
    assert!(rates.is_empty());
    assert_eq!(provider.rate_calls(), 0);
}

#[tokio::test]
async fn test_rates_follow_configured_provider_order() {
    let day = date(2024, 3, 10);
    let store = Arc::new(MemoryRateStore::new());
    let descriptor = store.get_or_create_provider_by_name("second").await.unwrap();
    store
        .insert_new_rate(day, &descriptor, "EUR", dec("0.93"))
        .await
        .unwrap();

    let first = Arc::new(FakeProvider::new("first").with_rate(day, "EUR", "0.91"));
    let second = Arc::new(FakeProvider::new("second").with_rate(day, "EUR", "0.99"));
    let manager = manager(store, vec![first.clone(), second.clone()], date(2024, 3, 15));

    let rates = manager.get_or_update_rate_by_date(day, "EUR").await.unwrap();
    assert_eq!(
        rates.iter().map(|r| r.rate).collect::<Vec<_>>(),
        vec![dec("0.91"), dec("0.93")]
    );
    assert_eq!(first.rate_calls(), 1);
    assert_eq!(second.rate_calls(), 0);
}

#[tokio::test]
async fn test_first_configured_provider_wins_over_older_store_entry() {
    let day = date(2024, 3, 10);
    let store = Arc::new(MemoryRateStore::new());
    let second = store.get_or_create_provider_by_name("second").await.unwrap();
    let first = store.get_or_create_provider_by_name("first").await.unwrap();
    store
        .insert_new_rate(day, &second, "EUR", dec("0.99"))
        .await
        .unwrap();
    store
        .insert_new_rate(day, &first, "EUR", dec("0.91"))
        .await
        .unwrap();

    let manager = manager(
        store,
        vec![
            Arc::new(FakeProvider::new("first")),
            Arc::new(FakeProvider::new("second")),
        ],
        date(2024, 3, 15),
    );

    let rate = manager
        .get_exchange_rate_by_date(day, "USD", "EUR")
        .await
        .unwrap();
    assert_eq!(rate, dec("0.91"));
}

#[tokio::test]
async fn test_unconfigured_provider_records_come_last() {
    let day = date(2024, 3, 10);
    let store = Arc::new(MemoryRateStore::new());
    let retired = store.get_or_create_provider_by_name("retired").await.unwrap();
    store
        .insert_new_rate(day, &retired, "EUR", dec("0.95"))
        .await
        .unwrap();

    let current = Arc::new(FakeProvider::new("current").with_rate(day, "EUR", "0.92"));
    let manager = manager(store, vec![current], date(2024, 3, 15));

    let rates = manager.get_or_update_rate_by_date(day, "EUR").await.unwrap();
    assert_eq!(
        rates.iter().map(|r| r.provider_name()).collect::<Vec<_>>(),
        vec![Some("current"), Some("retired")]
    );
}

#[tokio::test]
async fn test_exchange_rate_divides_chosen_rates() {
    let day = date(2024, 3, 10);
    let provider = Arc::new(
        FakeProvider::new("frankfurter")
            .with_rate(day, "EUR", "0.89")
            .with_rate(day, "CZK", "24.20"),
    );
    let manager = manager(Arc::new(MemoryRateStore::new()), vec![provider], date(2024, 3, 15));

    let rate = manager
        .get_exchange_rate_by_date(day, "EUR", "CZK")
        .await
        .unwrap();
    assert_eq!(rate, dec("24.20") / dec("0.89"));
}

#[tokio::test]
async fn test_exchange_rate_clamps_future_dates() {
    let today = date(2024, 3, 15);
    let provider = Arc::new(FakeProvider::new("frankfurter").with_rate(today, "EUR", "0.5"));
    let manager = manager(Arc::new(MemoryRateStore::new()), vec![provider], today);

    let rate = manager
        .get_exchange_rate_by_date(date(2030, 1, 1), "USD", "EUR")
        .await
        .unwrap();
    assert_eq!(rate, dec("0.5"));
}

#[tokio::test]
async fn test_missing_rate_is_unavailable() {
    let manager = manager(
        Arc::new(MemoryRateStore::new()),
        vec![Arc::new(FakeProvider::new("frankfurter"))],
        date(2024, 3, 15),
    );

    let err = manager
        .get_exchange_rate_by_date(date(2024, 3, 10), "EUR", "CZK")
        .await
        .unwrap_err();
    assert!(err.is_unavailable());
}

#[tokio::test]
async fn test_zero_source_rate_is_unavailable() {
    let day = date(2024, 3, 10);
    let provider = Arc::new(
        FakeProvider::new("frankfurter")
            .with_rate(day, "EUR", "0")
            .with_rate(day, "CZK", "24.2"),
    );
    let manager = manager(Arc::new(MemoryRateStore::new()), vec![provider], date(2024, 3, 15));

    let err = manager
        .get_exchange_rate_by_date(day, "EUR", "CZK")
        .await
        .unwrap_err();
    assert!(matches!(err, crate::core::error::RateError::ZeroRate { .. }));
}

#[tokio::test]
async fn test_average_with_short_side_warns_once() {
    let start = date(2016, 2, 7);
    let end = date(2016, 2, 17);
    let store = Arc::new(RecordingStore::with_period_sums(vec![
        (
            start,
            "EUR",
            vec![PeriodSum {
                source: PeriodSource::Provider(1),
                count: 11,
                sum: dec("8.9"),
            }],
        ),
        (
            start,
            "CZK",
            vec![PeriodSum {
                source: PeriodSource::Provider(1),
                count: 9,
                sum: dec("217.8"),
            }],
        ),
    ]));
    let manager = manager(store, Vec::new(), date(2024, 3, 15));

    let warnings = WarnCounter::default();
    let subscriber = tracing_subscriber::registry().with(warnings.clone());
    let _guard = tracing::subscriber::set_default(subscriber);

    let rate = manager
        .get_average_exchange_rate_by_dates(start, end, "EUR", "CZK")
        .await
        .unwrap()
        .unwrap();

    let eur_average = dec("8.9") / Decimal::from(11);
    let czk_average = dec("217.8") / Decimal::from(9);
    assert_eq!(rate, czk_average * (Decimal::ONE / eur_average));
    assert_eq!(warnings.count(), 1);
}

#[tokio::test]
async fn test_average_with_reversed_dates_counts_days() {
    let start = date(2024, 3, 5);
    let end = date(2024, 3, 1);
    let store = Arc::new(RecordingStore::with_period_sums(vec![
        (start, "EUR", vec![sum(1, 5, 5)]),
        (start, "CZK", vec![sum(1, 5, 100)]),
    ]));
    let manager = manager(store, Vec::new(), date(2024, 3, 15));

    let warnings = WarnCounter::default();
    let subscriber = tracing_subscriber::registry().with(warnings.clone());
    let _guard = tracing::subscriber::set_default(subscriber);

    let rate = manager
        .get_average_exchange_rate_by_dates(start, end, "EUR", "CZK")
        .await
        .unwrap();

    assert_eq!(rate, Some(dec("20")));
    assert_eq!(warnings.count(), 0);
}

#[tokio::test]
async fn test_average_pairs_sources_by_position() {
    let start = date(2024, 3, 1);
    let end = date(2024, 3, 2);
    let store = Arc::new(RecordingStore::with_period_sums(vec![
        (start, "EUR", vec![sum(1, 0, 0), sum(2, 2, 4)]),
        (start, "CZK", vec![sum(1, 2, 40), sum(3, 2, 10)]),
    ]));
    let manager = manager(store, Vec::new(), date(2024, 3, 15));

    // The first pair has no EUR data, the second pairs provider 2 with 3.
    let rate = manager
        .get_average_exchange_rate_by_dates(start, end, "EUR", "CZK")
        .await
        .unwrap();
    assert_eq!(rate, Some(dec("2.5")));
}

#[tokio::test]
async fn test_average_without_data_is_absent() {
    let start = date(2024, 3, 1);
    let store = Arc::new(RecordingStore::with_period_sums(vec![
        (start, "EUR", vec![sum(1, 2, 2)]),
        (start, "CZK", Vec::new()),
    ]));
    let manager = manager(store, Vec::new(), date(2024, 3, 15));

    let rate = manager
        .get_average_exchange_rate_by_dates(start, date(2024, 3, 2), "EUR", "CZK")
        .await
        .unwrap();
    assert!(rate.is_none());
}

#[tokio::test]
async fn test_average_against_base_currency() {
    let start = date(2024, 3, 1);
    let end = date(2024, 3, 2);
    let store = Arc::new(MemoryRateStore::new());
    let descriptor = store.get_or_create_provider_by_name("frankfurter").await.unwrap();
    for (day, rate) in [(start, "20"), (end, "30")] {
        store
            .insert_new_rate(day, &descriptor, "CZK", dec(rate))
            .await
            .unwrap();
    }
    let manager = manager(store, Vec::new(), date(2024, 3, 15));

    let rate = manager
        .get_average_exchange_rate_by_dates(start, end, "USD", "CZK")
        .await
        .unwrap();
    assert_eq!(rate, Some(dec("25")));
}

#[tokio::test]
async fn test_average_starting_in_future_uses_todays_rate() {
    let today = date(2024, 3, 15);
    let provider = Arc::new(FakeProvider::new("frankfurter").with_rate(today, "EUR", "0.8"));
    let manager = manager(Arc::new(MemoryRateStore::new()), vec![provider], today);

    let rate = manager
        .get_average_exchange_rate_by_dates(date(2024, 4, 1), date(2024, 4, 5), "USD", "EUR")
        .await
        .unwrap();
    assert_eq!(rate, Some(dec("0.8")));
}

fn interval_store(czk_monthly: Option<i64>) -> Arc<dyn RateStore> {
    let week_start = date(2020, 11, 24);
    let month_start = date(2020, 10, 31);
    let mut sums = vec![
        (week_start, "EUR", vec![sum(1, 7, 70)]),
        (week_start, "CZK", vec![sum(1, 7, 140)]),
        (month_start, "EUR", vec![sum(1, 31, 310)]),
    ];
    if let Some(total) = czk_monthly {
        sums.push((month_start, "CZK", vec![sum(1, 31, total)]));
    }
    Arc::new(RecordingStore::with_period_sums(sums))
}

async fn seed_daily(store: &Arc<dyn RateStore>, day: NaiveDate) {
    let descriptor = store.get_or_create_provider_by_name("currency_layer").await.unwrap();
    store
        .insert_exchange_rate_to_db(&[
            NewRate {
                date: day,
                currency: "EUR".to_string(),
                provider_id: descriptor.id,
                rate: Decimal::from(10),
            },
            NewRate {
                date: day,
                currency: "CZK".to_string(),
                provider_id: descriptor.id,
                rate: Decimal::from(15),
            },
        ])
        .await
        .unwrap();
}

#[tokio::test]
async fn test_intervals() {
    let day = date(2020, 11, 30);
    let store = interval_store(Some(775));
    seed_daily(&store, day).await;
    let manager = manager(store, Vec::new(), date(2024, 3, 15));

    let intervals = manager
        .get_exchange_rate_in_intervals_by_date(day, "EUR", "CZK")
        .await
        .unwrap();

    assert_eq!(
        intervals,
        vec![
            IntervalRate {
                interval: Interval::Daily,
                exchange_rate: "1.5".to_string(),
            },
            IntervalRate {
                interval: Interval::Weekly,
                exchange_rate: "2.0".to_string(),
            },
            IntervalRate {
                interval: Interval::Monthly,
                exchange_rate: "2.5".to_string(),
            },
        ]
    );
}

#[tokio::test]
async fn test_intervals_with_missing_average_are_empty() {
    let day = date(2020, 11, 30);
    let store = interval_store(None);
    seed_daily(&store, day).await;
    let manager = manager(store, Vec::new(), date(2024, 3, 15));

    let intervals = manager
        .get_exchange_rate_in_intervals_by_date(day, "EUR", "CZK")
        .await
        .unwrap();
    assert!(intervals.is_empty());
}

#[tokio::test]
async fn test_intervals_with_missing_daily_rate_are_empty() {
    let day = date(2020, 11, 30);
    let manager = manager(interval_store(Some(775)), Vec::new(), date(2024, 3, 15));

    let intervals = manager
        .get_exchange_rate_in_intervals_by_date(day, "EUR", "CZK")
        .await
        .unwrap();
    assert!(intervals.is_empty());
}

#[tokio::test]
async fn test_update_all_rates_isolates_provider_failures() {
    let day = date(2024, 3, 14);
    let store = Arc::new(MemoryRateStore::new());
    let empty = Arc::new(FakeProvider::new("grandtrunk"));
    let full = Arc::new(
        FakeProvider::new("frankfurter").with_day_rates(&[("CZK", "22.6"), ("EUR", "0.9")]),
    );
    let fakes = vec![empty.clone(), full.clone()];
    let providers = as_dyn(&fakes);
    let manager = manager(store.clone(), fakes, date(2024, 3, 15));

    let report = manager.update_all_rates_by_date(day, &providers).await;

    assert_eq!(
        report.entries,
        vec![
            ("grandtrunk".to_string(), super::UpdateOutcome::Empty),
            ("frankfurter".to_string(), super::UpdateOutcome::Stored(2)),
        ]
    );
    assert_eq!(report.stored_total(), 2);
    assert_eq!(empty.day_calls.load(Ordering::SeqCst), 1);
    assert_eq!(store.get_rates_by_date_currency(day, "CZK").await.unwrap().len(), 1);

    // Repeating the update keeps a single row per key.
    manager.update_all_rates_by_date(day, &providers).await;
    assert_eq!(store.get_rates_by_date_currency(day, "CZK").await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_update_all_rates_reports_store_failures() {
    let store = Arc::new(RecordingStore {
        fail_inserts: true,
        ..RecordingStore::default()
    });
    let first = Arc::new(FakeProvider::new("grandtrunk").with_day_rates(&[("EUR", "0.9")]));
    let second = Arc::new(FakeProvider::new("frankfurter").with_day_rates(&[("EUR", "0.9")]));
    let fakes = vec![first, second.clone()];
    let providers = as_dyn(&fakes);
    let manager = manager(store, fakes, date(2024, 3, 15));

    let report = manager
        .update_all_rates_by_date(date(2024, 3, 14), &providers)
        .await;

    assert!(report.has_failures());
    assert_eq!(report.entries.len(), 2);
    assert_eq!(second.day_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_update_all_historical_rates() {
    let store = Arc::new(MemoryRateStore::new());
    let provider = Arc::new(
        FakeProvider::new("frankfurter")
            .with_historical(date(2024, 3, 1), &[("EUR", "0.9"), ("CZK", "22")])
            .with_historical(date(2024, 3, 2), &[("EUR", "0.91")]),
    );
    let manager = manager(store.clone(), vec![provider], date(2024, 3, 15));

    let report = manager
        .update_all_historical_rates(date(2024, 3, 1))
        .await
        .unwrap();

    assert_eq!(report.stored_total(), 3);
    let sums = store
        .get_sum_of_rates_in_period(date(2024, 3, 1), date(2024, 3, 2), "EUR")
        .await
        .unwrap();
    assert_eq!((sums[0].count, sums[0].sum), (2, dec("1.81")));
}

#[tokio::test]
async fn test_update_all_historical_rates_propagates_store_failures() {
    let store = Arc::new(RecordingStore {
        fail_inserts: true,
        ..RecordingStore::default()
    });
    let provider = Arc::new(
        FakeProvider::new("frankfurter").with_historical(date(2024, 3, 1), &[("EUR", "0.9")]),
    );
    let manager = manager(store, vec![provider], date(2024, 3, 15));

    assert!(
        manager
            .update_all_historical_rates(date(2024, 3, 1))
            .await
            .is_err()
    );
}
