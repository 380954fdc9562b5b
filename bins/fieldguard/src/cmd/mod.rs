pub mod ingest;
pub mod types;
