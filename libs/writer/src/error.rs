use fieldguard_api::SchemaError;

/// Invocation-fatal errors, raised before any record is processed.
///
/// Record-level failures (decode, schema, store) are never returned as
/// errors; they are counted in the `Summary`.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config ({field}): {detail}")]
    Invalid { field: &'static str, detail: String },

    #[error("unknown record type '{name}' (known: {known})")]
    UnknownRecordType { name: String, known: String },

    #[error("record type '{record_type}' declared twice")]
    DuplicateRecordType { record_type: String },

    #[error("record type '{record_type}': {source}")]
    Schema { record_type: String, source: SchemaError },
}

impl ConfigError {
    pub fn invalid(field: &'static str, detail: impl Into<String>) -> Self {
        Self::Invalid { field, detail: detail.into() }
    }
}
