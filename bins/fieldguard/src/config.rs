use std::path::Path;

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Deserialize;

use fieldguard_api::RecordSchema;
use store_dynamodb::DynamoStoreConfig;
use store_memory::MemoryStoreConfig;
use writer::{RetryConfig, WriterConfig};

use crate::error::CliError;

#[derive(Parser)]
#[command(name = "fieldguard", about = "Field-level versioned writer for key-value stores")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write the records of one Kafka event and print the summary
    Ingest(IngestArgs),
    /// List the known record types with their key and version fields
    Types(TypesArgs),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    Memory,
    Dynamodb,
}

// ═══════════════════════════════════════════════════════════════
//  CLI args
// ═══════════════════════════════════════════════════════════════

#[derive(Args, Clone, Debug)]
pub struct IngestArgs {
    /// Path to the TOML config [default: fieldguard.toml, may be absent]
    #[arg(long, env = "FIELDGUARD_CONFIG")]
    pub config: Option<String>,

    /// Event JSON file; `-` or absent reads stdin
    #[arg(long)]
    pub event: Option<String>,

    /// Target table
    #[arg(long, env = "DYNAMODB_TABLE_NAME")]
    pub table: Option<String>,

    /// Record type every message is decoded as
    #[arg(long, env = "PARSER_NAME")]
    pub record_type: Option<String>,

    /// Build plans without calling the store
    #[arg(
        long,
        env = "DRY_RUN",
        num_args = 0..=1,
        default_missing_value = "true",
        value_parser = clap::builder::BoolishValueParser::new()
    )]
    pub dry_run: Option<bool>,

    /// Maximum conditional updates in flight
    #[arg(long, env = "MAX_BATCH_SIZE")]
    pub concurrency: Option<usize>,

    /// Invocation deadline in milliseconds
    #[arg(long, env = "DEADLINE_MS")]
    pub deadline_ms: Option<u64>,

    /// Store backend
    #[arg(long, value_enum, env = "FIELDGUARD_STORE")]
    pub store: Option<StoreKind>,
}

#[derive(Args, Clone, Debug)]
pub struct TypesArgs {
    #[arg(long, env = "FIELDGUARD_CONFIG")]
    pub config: Option<String>,
}

// ═══════════════════════════════════════════════════════════════
//  Config file (TOML)
// ═══════════════════════════════════════════════════════════════

pub const DEFAULT_CONFIG_PATH: &str = "fieldguard.toml";

#[derive(Debug, Default, Deserialize)]
pub struct FileConfig {
    pub table: Option<String>,
    pub record_type: Option<String>,
    pub dry_run: Option<bool>,
    pub concurrency: Option<usize>,
    pub retry: Option<RetryConfig>,
    pub call_timeout_ms: Option<u64>,
    pub deadline_ms: Option<u64>,
    pub shadow_suffix: Option<String>,
    #[serde(default)]
    pub store: StoreSection,
    /// Record types beyond the built-in catalog.
    #[serde(default)]
    pub record_types: Vec<RecordSchema>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StoreSection {
    pub backend: Option<StoreKind>,
    #[serde(default)]
    pub memory: MemoryStoreConfig,
    #[serde(default)]
    pub dynamodb: DynamoStoreConfig,
}

impl FileConfig {
    pub fn parse(content: &str, path: &str) -> Result<Self, CliError> {
        toml::from_str(content).map_err(|e| CliError::Config {
            context: "parse",
            detail: format!("'{path}': {e}"),
        })
    }

    /// Load `path`, or `DEFAULT_CONFIG_PATH` when none is given.
    ///
    /// Only the default file may be missing (an empty config); a named file
    /// that does not exist, cannot be read or does not parse is an error.
    pub fn load(path: Option<&str>) -> Result<Self, CliError> {
        let path = match path {
            Some(path) => path,
            None if !Path::new(DEFAULT_CONFIG_PATH).exists() => return Ok(Self::default()),
            None => DEFAULT_CONFIG_PATH,
        };
        let content = std::fs::read_to_string(path).map_err(|e| CliError::Config {
            context: "read",
            detail: format!("'{path}': {e}"),
        })?;
        Self::parse(&content, path)
    }
}

// ═══════════════════════════════════════════════════════════════
//  Effective: merged config
// ═══════════════════════════════════════════════════════════════

/// Config after merging: config file < env/CLI.
pub struct Effective {
    pub writer: WriterConfig,
    pub store: StoreKind,
    pub memory: MemoryStoreConfig,
    pub dynamodb: DynamoStoreConfig,
    pub record_types: Vec<RecordSchema>,
    pub event: Option<String>,
}

impl Effective {
    pub fn new(args: &IngestArgs) -> Result<Self, CliError> {
        Self::merge(args, FileConfig::load(args.config.as_deref())?)
    }

    pub fn merge(args: &IngestArgs, cfg: FileConfig) -> Result<Self, CliError> {
        let table = args.table.clone().or(cfg.table).ok_or_else(|| CliError::Config {
            context: "table",
            detail: "not set (--table, DYNAMODB_TABLE_NAME or `table` in config)".into(),
        })?;
        let record_type = args.record_type.clone().or(cfg.record_type).ok_or_else(|| CliError::Config {
            context: "record_type",
            detail: "not set (--record-type, PARSER_NAME or `record_type` in config)".into(),
        })?;

        let mut writer = WriterConfig::new(table, record_type);
        writer.dry_run = args.dry_run.or(cfg.dry_run).unwrap_or(false);
        if let Some(n) = args.concurrency.or(cfg.concurrency) {
            writer.concurrency = n;
        }
        if let Some(retry) = cfg.retry {
            writer.retry = retry;
        }
        if let Some(ms) = cfg.call_timeout_ms {
            writer.call_timeout_ms = ms;
        }
        writer.deadline_ms = args.deadline_ms.or(cfg.deadline_ms);
        if let Some(suffix) = cfg.shadow_suffix {
            writer.shadow_suffix = suffix;
        }

        Ok(Self {
            writer,
            store: args.store.or(cfg.store.backend).unwrap_or(StoreKind::Dynamodb),
            memory: cfg.store.memory,
            dynamodb: cfg.store.dynamodb,
            record_types: cfg.record_types,
            event: args.event.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> IngestArgs {
        IngestArgs {
            config: None,
            event: None,
            table: None,
            record_type: None,
            dry_run: None,
            concurrency: None,
            deadline_ms: None,
            store: None,
        }
    }

    const FILE: &str = r#"
        table = "dishes"
        record_type = "dish"
        concurrency = 8
        shadow_suffix = "__v"

        [retry]
        max_attempts = 6

        [store]
        backend = "memory"

        [store.memory]
        latency_ms = 5

        [[record_types]]
        name = "drink"
        fields = [
            { name = "sku", type = "string", role = "key" },
            { name = "rev", type = "int64", role = "version" },
            { name = "sizes", type = "array<string>" },
        ]
    "#;

    #[test]
    fn file_values_apply_when_args_are_absent() {
        let eff = Effective::merge(&args(), FileConfig::parse(FILE, "test").unwrap()).unwrap();
        assert_eq!(eff.writer.table, "dishes");
        assert_eq!(eff.writer.concurrency, 8);
        assert_eq!(eff.writer.retry.max_attempts, 6);
        assert_eq!(eff.writer.retry.base_delay_ms, 50);
        assert_eq!(eff.writer.shadow_suffix, "__v");
        assert_eq!(eff.store, StoreKind::Memory);
        assert_eq!(eff.memory.latency_ms, 5);
        assert_eq!(eff.record_types.len(), 1);
        assert_eq!(eff.record_types[0].fields[2].name, "sizes");
    }

    #[test]
    fn args_override_file() {
        let mut a = args();
        a.table = Some("override".into());
        a.concurrency = Some(2);
        a.dry_run = Some(true);
        a.store = Some(StoreKind::Dynamodb);

        let eff = Effective::merge(&a, FileConfig::parse(FILE, "test").unwrap()).unwrap();
        assert_eq!(eff.writer.table, "override");
        assert_eq!(eff.writer.concurrency, 2);
        assert!(eff.writer.dry_run);
        assert_eq!(eff.store, StoreKind::Dynamodb);
    }

    #[test]
    fn defaults_without_file() {
        let mut a = args();
        a.table = Some("t".into());
        a.record_type = Some("model".into());
        let eff = Effective::merge(&a, FileConfig::default()).unwrap();
        assert_eq!(eff.writer.concurrency, 25);
        assert!(!eff.writer.dry_run);
        assert_eq!(eff.store, StoreKind::Dynamodb);
    }

    #[test]
    fn missing_table_is_a_config_error() {
        match Effective::merge(&args(), FileConfig::default()) {
            Err(CliError::Config { context, .. }) => assert_eq!(context, "table"),
            _ => panic!("expected config error"),
        }
    }

    #[test]
    fn named_config_file_must_exist() {
        match FileConfig::load(Some("/definitely/not/here/prod-typo.toml")) {
            Err(CliError::Config { context, detail }) => {
                assert_eq!(context, "read");
                assert!(detail.contains("prod-typo.toml"), "{detail}");
            }
            _ => panic!("expected config error"),
        }
    }

    #[test]
    fn named_config_file_is_loaded() {
        let path = std::env::temp_dir().join(format!("fieldguard-{}.toml", std::process::id()));
        std::fs::write(&path, FILE).unwrap();
        let cfg = FileConfig::load(path.to_str());
        std::fs::remove_file(&path).unwrap();
        assert_eq!(cfg.unwrap().table.as_deref(), Some("dishes"));
    }

    #[test]
    fn dry_run_env_values() {
        for (raw, expected) in [("true", true), ("1", true), ("yes", true), ("false", false), ("0", false)] {
            let cli = Cli::try_parse_from(["fieldguard", "ingest", "--dry-run", raw]).unwrap();
            let Commands::Ingest(a) = cli.command else { panic!("expected ingest") };
            assert_eq!(a.dry_run, Some(expected), "{raw}");
        }
        let cli = Cli::try_parse_from(["fieldguard", "ingest", "--dry-run"]).unwrap();
        let Commands::Ingest(a) = cli.command else { panic!("expected ingest") };
        assert_eq!(a.dry_run, Some(true));
    }
}
