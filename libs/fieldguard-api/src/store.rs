use std::future::Future;
use std::pin::Pin;

use crate::error::StoreError;
use crate::plan::UpdatePlan;

/// Future returned by store calls.
pub type StoreFuture<'a> = Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + 'a>>;

/// Key-value store with per-item conditional updates.
///
/// The writer doesn't enumerate or know concrete implementations.
/// For the writer, a store is just this trait. One instance is built by the
/// composition root and shared (`Arc<dyn ConditionalStore>`) across every
/// call of the process; implementations must tolerate concurrent invocation.
///
/// There is deliberately no unconditional batch write here: a batch
/// primitive cannot carry per-item conditions.
pub trait ConditionalStore: Send + Sync {
    /// Short backend name for logs (`"memory"`, `"dynamodb"`).
    fn name(&self) -> &str;

    /// Apply every write of `plan` to the item under `plan.key()` in `table`,
    /// atomically, only if every shadow condition holds.
    ///
    /// A false condition is reported as `StoreErrorKind::ConditionFailed`
    /// and leaves the item untouched.
    fn update_if<'a>(&'a self, table: &'a str, plan: &'a UpdatePlan) -> StoreFuture<'a>;
}
