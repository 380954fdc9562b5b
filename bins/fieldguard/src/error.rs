#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("config ({context}): {detail}")]
    Config { context: &'static str, detail: String },

    #[error("{0}")]
    Writer(#[from] writer::ConfigError),

    #[error("store: {0}")]
    Store(#[from] fieldguard_api::StoreError),

    #[error("event ({source_name}): {detail}")]
    Event { source_name: String, detail: String },
}
