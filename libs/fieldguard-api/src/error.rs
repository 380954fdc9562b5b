/// Category of a store error. Drives the scheduler's classification
/// (conflict, retry, fail).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreErrorKind {
    /// The conditional check evaluated false: another writer holds newer data.
    ConditionFailed,
    /// Throughput exceeded or throttled. Transient.
    Throttled,
    /// Connection or transport error. Transient.
    Network,
    /// Call did not complete in time. Transient.
    Timeout,
    /// Malformed request rejected by the store.
    Validation,
    /// Access denied.
    Permission,
    /// Invalid client configuration, fails at startup.
    Config,
    /// Anything else the store reports.
    Other,
}

impl StoreErrorKind {
    /// Whether a retry may change the outcome.
    pub fn is_transient(self) -> bool {
        matches!(self, StoreErrorKind::Throttled | StoreErrorKind::Network | StoreErrorKind::Timeout)
    }
}

impl std::fmt::Display for StoreErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreErrorKind::ConditionFailed => f.write_str("condition_failed"),
            StoreErrorKind::Throttled => f.write_str("throttled"),
            StoreErrorKind::Network => f.write_str("network"),
            StoreErrorKind::Timeout => f.write_str("timeout"),
            StoreErrorKind::Validation => f.write_str("validation"),
            StoreErrorKind::Permission => f.write_str("permission"),
            StoreErrorKind::Config => f.write_str("config"),
            StoreErrorKind::Other => f.write_str("other"),
        }
    }
}

/// Error returned by every `ConditionalStore` call.
///
/// Carries a `StoreErrorKind` for classification and the store's message.
#[derive(Clone)]
pub struct StoreError {
    kind: StoreErrorKind,
    message: String,
}

impl StoreError {
    pub fn new(kind: StoreErrorKind, msg: impl Into<String>) -> Self {
        Self { kind, message: msg.into() }
    }

    pub fn condition_failed(msg: impl Into<String>) -> Self {
        Self::new(StoreErrorKind::ConditionFailed, msg)
    }

    pub fn throttled(msg: impl Into<String>) -> Self {
        Self::new(StoreErrorKind::Throttled, msg)
    }

    pub fn network(msg: impl Into<String>) -> Self {
        Self::new(StoreErrorKind::Network, msg)
    }

    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::new(StoreErrorKind::Timeout, msg)
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::new(StoreErrorKind::Validation, msg)
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::new(StoreErrorKind::Config, msg)
    }

    pub fn kind(&self) -> StoreErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Add context to the error, preserving the original kind.
    ///
    /// Produces: `"context: original message"`.
    pub fn with_context(self, ctx: impl std::fmt::Display) -> Self {
        Self {
            kind: self.kind,
            message: format!("{ctx}: {}", self.message),
        }
    }
}

impl std::fmt::Debug for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)
    }
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for StoreError {}

// ---------------------------------------------------------------------------
// Record-scoped errors: skipped and counted, never abort the batch
// ---------------------------------------------------------------------------

/// The record type descriptor or a record instance lacks a usable key/version.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SchemaError {
    #[error("record type '{record_type}' declares no {role} field")]
    MissingRole { record_type: String, role: &'static str },

    #[error("record type '{record_type}' declares more than one {role} field")]
    DuplicateRole { record_type: String, role: &'static str },

    #[error("record type '{record_type}': {role} field '{field}' has unsupported type {found}")]
    RoleType {
        record_type: String,
        role: &'static str,
        field: String,
        found: String,
    },

    #[error("field '{field}' collides with the shadow attribute of '{owner}'")]
    ShadowCollision { field: String, owner: String },

    #[error("shadow suffix must not be empty")]
    EmptyShadowSuffix,

    #[error("record has null or missing key '{field}'")]
    NullKey { field: String },

    #[error("record has null or missing version '{field}'")]
    NullVersion { field: String },

    #[error("key '{field}' must be an integer or string, got {found}")]
    BadKey { field: String, found: &'static str },

    #[error("version '{field}' must be an integer, got {found}")]
    BadVersion { field: String, found: &'static str },
}

/// A transport payload could not be turned into a `TypedRecord`.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DecodeError {
    #[error("empty payload")]
    Empty,

    #[error("base64: {0}")]
    Base64(String),

    #[error("json: {0}")]
    Json(String),

    #[error("expected a JSON object, got {0}")]
    NotObject(&'static str),

    #[error("field '{field}': expected {expected}, got {found}")]
    TypeMismatch {
        field: String,
        expected: String,
        found: &'static str,
    },
}

impl From<serde_json::Error> for DecodeError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e.to_string())
    }
}
