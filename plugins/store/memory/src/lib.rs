use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use tokio::sync::{Mutex, RwLock};

use fieldguard_api::{ConditionalStore, StoreError, StoreErrorKind, StoreFuture, UpdatePlan, Value};

/// One stored item: attribute name → value.
pub type Item = BTreeMap<String, Value>;

// ═══════════════════════════════════════════════════════════════
//  MemoryStoreConfig
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct MemoryStoreConfig {
    /// Artificial latency added to every call.
    #[serde(default)]
    pub latency_ms: u64,
}

// ═══════════════════════════════════════════════════════════════
//  MemoryStore
// ═══════════════════════════════════════════════════════════════

/// In-process conditional store with DynamoDB `UpdateItem` semantics:
/// the shadow conditions are checked and the writes applied under one
/// write lock, so a call either applies every write or none.
///
/// Also counts calls and tracks peak concurrency, and can be told to fail
/// the next calls with given error kinds.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<HashMap<String, HashMap<String, Item>>>,
    faults: Mutex<VecDeque<StoreErrorKind>>,
    latency: Duration,
    calls: AtomicU64,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &MemoryStoreConfig) -> Self {
        Self::new().with_latency(Duration::from_millis(config.latency_ms))
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Fail the next `kinds.len()` calls, in order, with these error kinds.
    pub async fn inject_faults(&self, kinds: impl IntoIterator<Item = StoreErrorKind>) {
        self.faults.lock().await.extend(kinds);
    }

    /// Store calls received so far, failed ones included.
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }

    /// Highest number of calls observed in progress at once.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::Relaxed)
    }

    pub async fn get_item(&self, table: &str, key: &Value) -> Option<Item> {
        let tables = self.tables.read().await;
        tables.get(table)?.get(&key_repr(key)).cloned()
    }

    /// Unconditional put, for seeding.
    pub async fn put_item(&self, table: &str, key: &Value, item: Item) {
        let mut tables = self.tables.write().await;
        tables.entry(table.to_string()).or_default().insert(key_repr(key), item);
    }

    pub async fn len(&self, table: &str) -> usize {
        self.tables.read().await.get(table).map_or(0, HashMap::len)
    }

    async fn apply(&self, table: &str, plan: &UpdatePlan) -> Result<(), StoreError> {
        if plan.is_empty() {
            return Err(StoreError::validation("update expression is empty"));
        }

        let mut tables = self.tables.write().await;
        let items = tables.entry(table.to_string()).or_default();
        let key = key_repr(plan.key());

        if let Some(item) = items.get(&key) {
            for w in plan.writes() {
                // A NULL-typed shadow fails both `attribute_not_exists` and `<`.
                let fresh = match item.get(&w.shadow) {
                    None => true,
                    Some(Value::Int(stored)) => *stored < plan.version(),
                    Some(_) => false,
                };
                if !fresh {
                    return Err(StoreError::condition_failed(format!(
                        "{} is not older than {}",
                        w.shadow,
                        plan.version()
                    )));
                }
            }
        }

        let item = items.entry(key).or_insert_with(|| {
            let mut item = Item::new();
            item.insert(plan.key_field().to_string(), plan.key().clone());
            item
        });
        for w in plan.writes() {
            item.insert(w.field.clone(), w.value.clone());
            item.insert(w.shadow.clone(), Value::Int(plan.version()));
        }
        Ok(())
    }
}

impl ConditionalStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    fn update_if<'a>(&'a self, table: &'a str, plan: &'a UpdatePlan) -> StoreFuture<'a> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::Relaxed);
            let _guard = InFlight::enter(&self.in_flight, &self.max_in_flight);

            if !self.latency.is_zero() {
                tokio::time::sleep(self.latency).await;
            }

            if let Some(kind) = self.faults.lock().await.pop_front() {
                tracing::debug!(table, %kind, "injected fault");
                return Err(StoreError::new(kind, format!("injected {kind}")));
            }

            self.apply(table, plan).await
        })
    }
}

/// Keys of different kinds never collide: `1` and `"1"` are distinct items.
fn key_repr(key: &Value) -> String {
    format!("{}:{key}", key.kind())
}

/// Decrements the in-flight counter when the call ends or is aborted.
struct InFlight {
    counter: Arc<AtomicUsize>,
}

impl InFlight {
    fn enter(counter: &Arc<AtomicUsize>, peak: &AtomicUsize) -> Self {
        let now = counter.fetch_add(1, Ordering::SeqCst) + 1;
        peak.fetch_max(now, Ordering::SeqCst);
        Self { counter: counter.clone() }
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::SeqCst);
    }
}
