use std::sync::Arc;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use fieldguard_api::{ConditionalStore, TypedRecord, UpdatePlan};

use crate::config::WriterConfig;
use crate::dry_run;
use crate::error::ConfigError;
use crate::outcome::{OutcomeAggregator, RunMode, Summary};
use crate::plan::build_plan;
use crate::registry::{DecoderRegistry, RecordType};
use crate::resolver::ResolvedSchema;
use crate::scheduler::Scheduler;
use crate::source::KafkaEvent;

/// One configured writer: record type resolved, store client bound.
///
/// Built once per process; `ingest_*` is called once per invocation and
/// always returns a `Summary`. Record-level failures are counted, never
/// returned.
pub struct Ingestor {
    config: WriterConfig,
    record_type: RecordType,
    schema: ResolvedSchema,
    store: Arc<dyn ConditionalStore>,
}

impl Ingestor {
    pub fn new(
        store: Arc<dyn ConditionalStore>,
        registry: &DecoderRegistry,
        config: WriterConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let record_type = registry.get(&config.record_type)?.clone();
        let schema = ResolvedSchema::resolve(record_type.schema(), &config.shadow_suffix).map_err(|source| {
            ConfigError::Schema {
                record_type: config.record_type.clone(),
                source,
            }
        })?;

        tracing::info!(
            store = %store.name(),
            table = %config.table,
            record_type = %schema.record_type(),
            key = %schema.key_field(),
            version = %schema.version_field(),
            concurrency = config.concurrency,
            dry_run = config.dry_run,
            "writer ready"
        );

        Ok(Self {
            config,
            record_type,
            schema,
            store,
        })
    }

    pub fn config(&self) -> &WriterConfig {
        &self.config
    }

    pub fn schema(&self) -> &ResolvedSchema {
        &self.schema
    }

    /// Decode every message of `event` and write the resulting records.
    pub async fn ingest_event(&self, event: KafkaEvent, token: &CancellationToken) -> Summary {
        let started = Instant::now();
        let stats = Arc::new(OutcomeAggregator::new());

        let messages = event.flatten();
        stats.add_received(messages.len() as u64);

        let decoder = self.record_type.decoder();
        let mut records = Vec::with_capacity(messages.len());
        for message in &messages {
            match message.payload().and_then(|p| decoder.decode(&p)) {
                Ok(record) => records.push(record),
                Err(e) => {
                    tracing::warn!(
                        topic = message.topic.as_deref().unwrap_or("-"),
                        partition = message.partition,
                        offset = message.offset,
                        error = %e,
                        "undecodable message, skipping"
                    );
                    stats.decode_skipped();
                }
            }
        }

        self.process(records, stats, started, token).await
    }

    /// Write already-decoded records.
    pub async fn ingest_records(&self, records: Vec<TypedRecord>, token: &CancellationToken) -> Summary {
        let started = Instant::now();
        let stats = Arc::new(OutcomeAggregator::new());
        stats.add_received(records.len() as u64);
        self.process(records, stats, started, token).await
    }

    async fn process(
        &self,
        records: Vec<TypedRecord>,
        stats: Arc<OutcomeAggregator>,
        started: Instant,
        token: &CancellationToken,
    ) -> Summary {
        let plans = self.plan_all(&records, &stats);

        let mode = if self.config.dry_run {
            dry_run::simulate(&self.config.table, &plans, &stats);
            RunMode::DryRun
        } else {
            let deadline = self.config.deadline().map(|d| started + d);
            Scheduler::from_config(self.store.clone(), &self.config)
                .run(plans, &stats, deadline, token)
                .await;
            RunMode::Live
        };

        let summary = stats.summary(mode, started.elapsed());
        tracing::info!(
            table = %self.config.table,
            received = summary.received,
            applied = summary.applied,
            conflicted = summary.conflicted,
            transient_failed = summary.transient_failed,
            fatal_failed = summary.fatal_failed,
            skipped = summary.decode_skipped + summary.schema_skipped,
            elapsed_ms = summary.elapsed_ms,
            "{summary}"
        );
        summary
    }

    /// Build plans synchronously, before any permit is requested.
    fn plan_all(&self, records: &[TypedRecord], stats: &OutcomeAggregator) -> Vec<UpdatePlan> {
        let mut plans = Vec::with_capacity(records.len());
        for record in records {
            match build_plan(record, &self.schema) {
                Ok(plan) if plan.is_empty() => {
                    tracing::debug!(key = %plan.key(), version = plan.version(), "no payload fields, nothing to write");
                    stats.no_op();
                }
                Ok(plan) => plans.push(plan),
                Err(e) => {
                    tracing::warn!(record_type = %self.schema.record_type(), error = %e, "invalid record, skipping");
                    stats.schema_skipped();
                }
            }
        }
        plans
    }
}
