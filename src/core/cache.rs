use chrono::NaiveDate;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// Remembers a single value keyed by calendar day. Storing a value for a new
/// day evicts the previous one.
#[derive(Clone)]
pub struct DailyCache<V>
where
    V: Clone + Send + Sync,
{
    inner: Arc<Mutex<Option<(NaiveDate, V)>>>,
}

impl<V> DailyCache<V>
where
    V: Clone + Send + Sync,
{
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(None)),
        }
    }

    pub async fn get(&self, day: NaiveDate) -> Option<V> {
        let cache = self.inner.lock().await;
        let value = match cache.as_ref() {
            Some((cached_day, value)) if *cached_day == day => Some(value.clone()),
            _ => None,
        };
        if value.is_some() {
            debug!(%day, "Cache HIT");
        } else {
            debug!(%day, "Cache MISS");
        }
        value
    }

    pub async fn put(&self, day: NaiveDate, value: V) {
        let mut cache = self.inner.lock().await;
        debug!(%day, "Cache PUT");
        *cache = Some((day, value));
    }
}

impl<V> Default for DailyCache<V>
where
    V: Clone + Send + Sync,
{
    fn default() -> Self {
        Self::new()
    }
}
