use std::sync::Arc;

use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;

use fieldguard_api::ConditionalStore;
use store_dynamodb::DynamoStore;
use store_memory::MemoryStore;
use writer::{DecoderRegistry, Ingestor, KafkaEvent};

use crate::config::{Effective, IngestArgs, StoreKind};
use crate::error::CliError;

pub async fn run(args: IngestArgs) -> Result<(), CliError> {
    let eff = Effective::new(&args)?;

    let mut registry = DecoderRegistry::with_builtin();
    for schema in eff.record_types {
        registry.register(schema)?;
    }

    // Dry runs never call the store, so they need no credentials.
    let store: Arc<dyn ConditionalStore> = match eff.store {
        StoreKind::Dynamodb if !eff.writer.dry_run => Arc::new(DynamoStore::new(&eff.dynamodb).await?),
        StoreKind::Dynamodb | StoreKind::Memory => Arc::new(MemoryStore::from_config(&eff.memory)),
    };

    let ingestor = Ingestor::new(store, &registry, eff.writer)?;

    let source_name = eff.event.clone().unwrap_or_else(|| "-".into());
    let bytes = read_event(eff.event.as_deref()).await.map_err(|e| CliError::Event {
        source_name: source_name.clone(),
        detail: e.to_string(),
    })?;
    let event = KafkaEvent::from_json(&bytes).map_err(|e| CliError::Event {
        source_name,
        detail: e.to_string(),
    })?;

    let token = CancellationToken::new();
    let interrupt = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted, abandoning unfinished writes");
            interrupt.cancel();
        }
    });

    let summary = ingestor.ingest_event(event, &token).await;
    match serde_json::to_string(&summary) {
        Ok(json) => println!("{json}"),
        Err(_) => println!("{summary}"),
    }
    Ok(())
}

async fn read_event(path: Option<&str>) -> std::io::Result<Vec<u8>> {
    match path {
        None | Some("-") => {
            let mut buf = Vec::new();
            tokio::io::stdin().read_to_end(&mut buf).await?;
            Ok(buf)
        }
        Some(path) => tokio::fs::read(path).await,
    }
}
