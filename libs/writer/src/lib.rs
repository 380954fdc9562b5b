//! Field-level optimistic-concurrency writer.
//!
//! Every payload field `F` of a record is stored with a shadow attribute
//! `F_version`. A record is written as one conditional update per item,
//! applied only if every touched field's shadow is absent or older than the
//! record's version. Stale records therefore never overwrite newer fields,
//! and records touching disjoint fields never clobber each other.
//!
//! ```text
//! message → decoder → TypedRecord → resolver → plan → scheduler → store
//!                                                  ↘ dry-run gate
//!                                  outcome aggregator → Summary
//! ```

pub mod catalog;
pub mod config;
pub mod dry_run;
pub mod error;
pub mod ingest;
pub mod outcome;
pub mod plan;
pub mod registry;
pub mod resolver;
pub mod retry;
pub mod scheduler;
pub mod source;

pub use config::WriterConfig;
pub use error::ConfigError;
pub use ingest::Ingestor;
pub use outcome::{Outcome, OutcomeAggregator, RunMode, Summary};
pub use plan::build_plan;
pub use registry::{DecoderRegistry, JsonDecoder, RecordDecoder, RecordType};
pub use resolver::{DEFAULT_SHADOW_SUFFIX, ResolvedSchema};
pub use retry::{RetryConfig, RetryPolicy};
pub use scheduler::Scheduler;
pub use source::{KafkaEvent, KafkaRecord};
