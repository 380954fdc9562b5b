use std::collections::BTreeMap;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::Deserialize;

use fieldguard_api::DecodeError;

/// Kafka trigger event: topic-partition → messages.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct KafkaEvent {
    #[serde(default, rename = "eventSource")]
    pub event_source: Option<String>,
    #[serde(default)]
    pub records: BTreeMap<String, Vec<KafkaRecord>>,
}

/// One message of a `KafkaEvent`. `value` is base64 of the payload.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct KafkaRecord {
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub partition: i32,
    #[serde(default)]
    pub offset: i64,
    #[serde(default)]
    pub timestamp: Option<i64>,
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
}

impl KafkaEvent {
    pub fn from_json(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    /// All messages of all partitions, partitions in key order, each
    /// partition's messages in delivery order.
    pub fn flatten(self) -> Vec<KafkaRecord> {
        self.records.into_values().flatten().collect()
    }

    pub fn len(&self) -> usize {
        self.records.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KafkaRecord {
    /// Base64-decoded payload. A missing or empty value is `DecodeError::Empty`.
    pub fn payload(&self) -> Result<Vec<u8>, DecodeError> {
        let value = self.value.as_deref().map(str::trim).unwrap_or_default();
        if value.is_empty() {
            return Err(DecodeError::Empty);
        }
        STANDARD
            .decode(value)
            .map_err(|e| DecodeError::Base64(e.to_string()))
    }

    /// Encode `payload` into a record, for producers and tests.
    pub fn with_payload(partition: i32, offset: i64, payload: &[u8]) -> Self {
        Self {
            partition,
            offset,
            value: Some(STANDARD.encode(payload)),
            ..Self::default()
        }
    }
}
