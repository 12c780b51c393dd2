//! Core business logic abstractions

pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod log;
pub mod provider;
pub mod rate;
pub mod store;

// Re-export main types for cleaner imports
pub use cache::DailyCache;
pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{RateError, StoreError};
pub use provider::RateProvider;
pub use rate::{
    CurrencySet, DayRates, ExchangeRate, HistoricalRates, Interval, IntervalRate, NewRate,
    PeriodSource, PeriodSum, ProviderDescriptor,
};
pub use store::RateStore;
