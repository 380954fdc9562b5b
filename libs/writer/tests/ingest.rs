use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use fieldguard_api::{ConditionalStore, Field, RecordSchema, ScalarType, StoreErrorKind, TypedRecord, Value};
use store_memory::MemoryStore;
use writer::{
    ConfigError, DecoderRegistry, Ingestor, KafkaEvent, KafkaRecord, RetryConfig, RunMode, WriterConfig,
};

const TABLE: &str = "listings";

fn listing() -> RecordSchema {
    RecordSchema::new(
        "listing",
        vec![
            Field::key("key", ScalarType::Int64),
            Field::version("version"),
            Field::scalar("price", ScalarType::Int64),
            Field::scalar("status", ScalarType::String),
        ],
    )
}

fn registry() -> DecoderRegistry {
    let mut r = DecoderRegistry::with_builtin();
    r.register(listing()).unwrap();
    r
}

fn config() -> WriterConfig {
    let mut c = WriterConfig::new(TABLE, "listing");
    c.retry = RetryConfig {
        max_attempts: 4,
        base_delay_ms: 1,
        max_delay_ms: 5,
    };
    c
}

fn ingestor(store: &Arc<MemoryStore>, config: WriterConfig) -> Ingestor {
    let store: Arc<dyn ConditionalStore> = store.clone();
    Ingestor::new(store, &registry(), config).unwrap()
}

fn record(key: i64, version: i64) -> TypedRecord {
    TypedRecord::new().with("key", key).with("version", version)
}

async fn item(store: &MemoryStore, key: i64) -> std::collections::BTreeMap<String, Value> {
    store.get_item(TABLE, &Value::Int(key)).await.unwrap()
}

// ═══════════════════════════════════════════════════════════════
//  Field-level versioning
// ═══════════════════════════════════════════════════════════════

#[tokio::test]
async fn stale_record_conflicts_and_leaves_item_untouched() {
    let store = Arc::new(MemoryStore::new());
    let w = ingestor(&store, config());
    let token = CancellationToken::new();

    let newer = record(77593296, 3).with("price", 5200i64);
    let s = w.ingest_records(vec![newer], &token).await;
    assert_eq!(s.applied, 1);

    let stale = record(77593296, 2).with("price", 4900i64).with("status", "ON_SALE");
    let s = w.ingest_records(vec![stale], &token).await;
    assert_eq!(s.conflicted, 1);
    assert_eq!(s.applied, 0);
    assert_eq!(s.retries, 0);

    let item = item(&store, 77593296).await;
    assert_eq!(item["price"], Value::Int(5200));
    assert_eq!(item["price_version"], Value::Int(3));
    assert!(!item.contains_key("status"));
    assert!(!item.contains_key("status_version"));
}

#[tokio::test]
async fn older_version_of_written_fields_is_rejected() {
    let store = Arc::new(MemoryStore::new());
    let w = ingestor(&store, config());
    let token = CancellationToken::new();

    let current = record(77593296, 2).with("price", 5200i64).with("status", "ON_SALE");
    assert_eq!(w.ingest_records(vec![current], &token).await.applied, 1);

    let s = w.ingest_records(vec![record(77593296, 1).with("price", 4000i64)], &token).await;
    assert_eq!(s.conflicted, 1);
    assert_eq!(s.store_calls, 1);

    let item = item(&store, 77593296).await;
    assert_eq!(item["price"], Value::Int(5200));
    assert_eq!(item["price_version"], Value::Int(2));
    assert_eq!(item["status"], Value::from("ON_SALE"));
    assert_eq!(item["status_version"], Value::Int(2));
}

#[tokio::test]
async fn older_record_still_fills_fields_never_written() {
    let store = Arc::new(MemoryStore::new());
    let w = ingestor(&store, config());
    let token = CancellationToken::new();

    w.ingest_records(vec![record(1, 5).with("price", 100i64)], &token).await;
    let s = w.ingest_records(vec![record(1, 2).with("status", "SOLD_OUT")], &token).await;
    assert_eq!(s.applied, 1);

    let item = item(&store, 1).await;
    assert_eq!(item["price_version"], Value::Int(5));
    assert_eq!(item["status"], Value::from("SOLD_OUT"));
    assert_eq!(item["status_version"], Value::Int(2));
}

#[tokio::test]
async fn same_version_replay_is_a_conflict() {
    let store = Arc::new(MemoryStore::new());
    let w = ingestor(&store, config());
    let token = CancellationToken::new();
    let r = record(9, 4).with("price", 1i64);

    assert_eq!(w.ingest_records(vec![r.clone()], &token).await.applied, 1);
    assert_eq!(w.ingest_records(vec![r], &token).await.conflicted, 1);
}

#[tokio::test]
async fn null_fields_keep_stored_value_and_version() {
    let store = Arc::new(MemoryStore::new());
    let w = ingestor(&store, config());
    let token = CancellationToken::new();

    w.ingest_records(vec![record(1, 1).with("price", 10i64).with("status", "A")], &token).await;
    let s = w
        .ingest_records(vec![record(1, 2).with("price", Value::Null).with("status", "B")], &token)
        .await;
    assert_eq!(s.applied, 1);

    let item = item(&store, 1).await;
    assert_eq!(item["price"], Value::Int(10));
    assert_eq!(item["price_version"], Value::Int(1));
    assert_eq!(item["status"], Value::from("B"));
    assert_eq!(item["status_version"], Value::Int(2));
}

#[tokio::test]
async fn record_level_version_attribute_is_not_written() {
    let store = Arc::new(MemoryStore::new());
    let w = ingestor(&store, config());
    w.ingest_records(vec![record(1, 7).with("price", 1i64)], &CancellationToken::new()).await;
    assert!(!item(&store, 1).await.contains_key("version"));
}

// ═══════════════════════════════════════════════════════════════
//  Skips and dry run
// ═══════════════════════════════════════════════════════════════

fn mixed_event() -> KafkaEvent {
    let messages = vec![
        KafkaRecord::with_payload(0, 1, br#"{"key": 1, "version": 2, "price": 10}"#),
        KafkaRecord { partition: 0, offset: 2, ..KafkaRecord::default() },
        KafkaRecord::with_payload(0, 3, br#"{"key": 2, "price": 10}"#),
        KafkaRecord::with_payload(0, 4, br#"{"key": 3, "version": 1}"#),
        KafkaRecord::with_payload(0, 5, br#"{"key": "x", "version": 1}"#),
        KafkaRecord::with_payload(0, 6, br#"{"key": 4, "version": 1, "status": "NEW", "extra": true}"#),
    ];
    let mut event = KafkaEvent::default();
    event.records.insert("listings-0".into(), messages);
    event
}

#[tokio::test]
async fn skips_are_counted_not_fatal() {
    let store = Arc::new(MemoryStore::new());
    let s = ingestor(&store, config()).ingest_event(mixed_event(), &CancellationToken::new()).await;

    assert_eq!(s.mode, RunMode::Live);
    assert_eq!(s.received, 6);
    assert_eq!(s.applied, 2);
    assert_eq!(s.decode_skipped, 2);
    assert_eq!(s.schema_skipped, 1);
    assert_eq!(s.no_op, 1);
    assert_eq!(s.store_calls, 2);
    assert!(s.is_balanced());
}

#[tokio::test]
async fn dry_run_builds_plans_without_store_calls() {
    let token = CancellationToken::new();

    let live_store = Arc::new(MemoryStore::new());
    let live = ingestor(&live_store, config()).ingest_event(mixed_event(), &token).await;

    let dry_store = Arc::new(MemoryStore::new());
    let mut dry_config = config();
    dry_config.dry_run = true;
    let dry = ingestor(&dry_store, dry_config).ingest_event(mixed_event(), &token).await;

    assert_eq!(dry.mode, RunMode::DryRun);
    assert_eq!(dry_store.calls(), 0);
    assert_eq!(dry.store_calls, 0);
    assert_eq!(dry.applied, live.applied);
    assert_eq!(dry.decode_skipped, live.decode_skipped);
    assert_eq!(dry.schema_skipped, live.schema_skipped);
    assert_eq!(dry.no_op, live.no_op);
    assert_eq!(dry_store.len(TABLE).await, 0);
    assert!(dry.to_string().contains("(DRY_RUN)"));
}

// ═══════════════════════════════════════════════════════════════
//  Retry classification
// ═══════════════════════════════════════════════════════════════

#[tokio::test]
async fn transient_errors_are_retried() {
    let store = Arc::new(MemoryStore::new());
    store.inject_faults([StoreErrorKind::Throttled, StoreErrorKind::Network]).await;

    let s = ingestor(&store, config())
        .ingest_records(vec![record(1, 1).with("price", 1i64)], &CancellationToken::new())
        .await;
    assert_eq!(s.applied, 1);
    assert_eq!(s.retries, 2);
    assert_eq!(s.store_calls, 3);
    assert_eq!(store.calls(), 3);
}

#[tokio::test]
async fn exhausted_retries_are_fatal_after_max_attempts() {
    let store = Arc::new(MemoryStore::new());
    store.inject_faults([StoreErrorKind::Throttled; 10]).await;

    let s = ingestor(&store, config())
        .ingest_records(vec![record(1, 1).with("price", 1i64)], &CancellationToken::new())
        .await;
    assert_eq!(s.fatal_failed, 1);
    assert_eq!(s.store_calls, 4);
    assert_eq!(s.retries, 3);
}

#[tokio::test]
async fn permanent_errors_are_not_retried() {
    let store = Arc::new(MemoryStore::new());
    store.inject_faults([StoreErrorKind::Permission]).await;

    let s = ingestor(&store, config())
        .ingest_records(vec![record(1, 1).with("price", 1i64)], &CancellationToken::new())
        .await;
    assert_eq!(s.fatal_failed, 1);
    assert_eq!(s.store_calls, 1);
    assert_eq!(s.retries, 0);
}

#[tokio::test]
async fn slow_calls_time_out_as_transient() {
    let store = Arc::new(MemoryStore::new().with_latency(Duration::from_millis(200)));
    let mut c = config();
    c.call_timeout_ms = 20;
    c.retry.max_attempts = 2;

    let s = ingestor(&store, c)
        .ingest_records(vec![record(1, 1).with("price", 1i64)], &CancellationToken::new())
        .await;
    assert_eq!(s.fatal_failed, 1);
    assert_eq!(s.store_calls, 2);
    assert_eq!(s.retries, 1);
}

// ═══════════════════════════════════════════════════════════════
//  Cancellation
// ═══════════════════════════════════════════════════════════════

#[tokio::test]
async fn cancelled_token_dispatches_nothing() {
    let store = Arc::new(MemoryStore::new());
    let token = CancellationToken::new();
    token.cancel();

    let records = (1..=4).map(|k| record(k, 1).with("price", k)).collect();
    let s = ingestor(&store, config()).ingest_records(records, &token).await;
    assert_eq!(s.abandoned, 4);
    assert_eq!(s.transient_failed, 4);
    assert_eq!(store.calls(), 0);
}

// ═══════════════════════════════════════════════════════════════
//  Configuration
// ═══════════════════════════════════════════════════════════════

#[test]
fn unknown_record_type_fails_before_processing() {
    let store: Arc<dyn ConditionalStore> = Arc::new(MemoryStore::new());
    let c = WriterConfig::new(TABLE, "Drink");
    assert!(matches!(
        Ingestor::new(store, &registry(), c),
        Err(ConfigError::UnknownRecordType { .. })
    ));
}

#[test]
fn invalid_schema_is_a_config_error() {
    let mut registry = DecoderRegistry::new();
    registry
        .register(RecordSchema::new("keyless", vec![Field::version("version")]))
        .unwrap();
    let store: Arc<dyn ConditionalStore> = Arc::new(MemoryStore::new());
    assert!(matches!(
        Ingestor::new(store, &registry, WriterConfig::new(TABLE, "keyless")),
        Err(ConfigError::Schema { .. })
    ));
}

#[test]
fn legacy_parser_name_resolves() {
    let store: Arc<dyn ConditionalStore> = Arc::new(MemoryStore::new());
    let w = Ingestor::new(store, &registry(), WriterConfig::new(TABLE, "DishParser")).unwrap();
    assert_eq!(w.schema().record_type(), "dish");
    assert_eq!(w.schema().key_field(), "id");
}
