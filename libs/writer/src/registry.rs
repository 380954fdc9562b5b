use std::collections::BTreeMap;
use std::sync::Arc;

use fieldguard_api::{DecodeError, FieldType, RecordSchema, ScalarType, TypedRecord, Value};

use crate::catalog;
use crate::error::ConfigError;

// ════════════════════════════════════════════════════════════════
//  Decoder
// ════════════════════════════════════════════════════════════════

/// Turns one raw payload into a `TypedRecord` of a known type.
pub trait RecordDecoder: Send + Sync {
    fn decode(&self, payload: &[u8]) -> Result<TypedRecord, DecodeError>;
}

/// JSON object decoder driven by a `RecordSchema`.
///
/// Fields are taken in schema order and coerced to their declared type.
/// Unknown JSON properties are ignored; absent fields are left out of the
/// record; explicit `null`s are kept as `Value::Null`.
pub struct JsonDecoder {
    schema: Arc<RecordSchema>,
}

impl JsonDecoder {
    pub fn new(schema: Arc<RecordSchema>) -> Self {
        Self { schema }
    }
}

impl RecordDecoder for JsonDecoder {
    fn decode(&self, payload: &[u8]) -> Result<TypedRecord, DecodeError> {
        if payload.is_empty() {
            return Err(DecodeError::Empty);
        }
        let json: serde_json::Value = serde_json::from_slice(payload)?;
        let serde_json::Value::Object(mut obj) = json else {
            return Err(DecodeError::NotObject(json_kind(&json)));
        };

        let mut record = TypedRecord::new();
        for field in &self.schema.fields {
            let Some(raw) = obj.remove(&field.name) else {
                continue;
            };
            let value = coerce(&field.name, field.field_type, raw)?;
            record.set(field.name.as_str(), value);
        }
        Ok(record)
    }
}

fn coerce(name: &str, ty: FieldType, raw: serde_json::Value) -> Result<Value, DecodeError> {
    if raw.is_null() {
        return Ok(Value::Null);
    }
    match ty {
        FieldType::Scalar(s) => coerce_scalar(name, ty, s, raw),
        FieldType::Array(s) => match raw {
            serde_json::Value::Array(items) => items
                .into_iter()
                .map(|item| match item {
                    serde_json::Value::Null => Ok(Value::Null),
                    item => coerce_scalar(name, ty, s, item),
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Value::List),
            other => Err(mismatch(name, ty, &other)),
        },
    }
}

fn coerce_scalar(
    name: &str,
    declared: FieldType,
    scalar: ScalarType,
    raw: serde_json::Value,
) -> Result<Value, DecodeError> {
    match (scalar, raw) {
        (ScalarType::Bool, serde_json::Value::Bool(b)) => Ok(Value::Bool(b)),
        (ScalarType::Int64, serde_json::Value::Number(n)) if n.is_i64() => Ok(Value::Int(n.as_i64().unwrap_or_default())),
        (ScalarType::Int32, serde_json::Value::Number(n)) if n.as_i64().is_some_and(|v| i32::try_from(v).is_ok()) => {
            Ok(Value::Int(n.as_i64().unwrap_or_default()))
        }
        (ScalarType::Float64, serde_json::Value::Number(n)) => match n.as_f64() {
            Some(f) => Ok(Value::Float(f)),
            None => Err(DecodeError::TypeMismatch {
                field: name.to_string(),
                expected: declared.to_string(),
                found: "number",
            }),
        },
        (ScalarType::String, serde_json::Value::String(s)) => Ok(Value::String(s)),
        (ScalarType::Json, other) => Ok(Value::from(other)),
        (_, other) => Err(mismatch(name, declared, &other)),
    }
}

fn mismatch(name: &str, declared: FieldType, found: &serde_json::Value) -> DecodeError {
    DecodeError::TypeMismatch {
        field: name.to_string(),
        expected: declared.to_string(),
        found: json_kind(found),
    }
}

fn json_kind(v: &serde_json::Value) -> &'static str {
    match v {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

// ════════════════════════════════════════════════════════════════
//  Registry
// ════════════════════════════════════════════════════════════════

/// A registered record type: its schema and the decoder for its payloads.
#[derive(Clone)]
pub struct RecordType {
    schema: Arc<RecordSchema>,
    decoder: Arc<dyn RecordDecoder>,
}

impl RecordType {
    pub fn schema(&self) -> &RecordSchema {
        &self.schema
    }

    pub fn decoder(&self) -> &dyn RecordDecoder {
        &*self.decoder
    }
}

/// Record types by identifier. Built once at startup.
#[derive(Default, Clone)]
pub struct DecoderRegistry {
    types: BTreeMap<String, RecordType>,
    aliases: BTreeMap<String, String>,
}

impl DecoderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the built-in catalog and its legacy aliases.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        for schema in catalog::all() {
            let name = schema.name.clone();
            let schema = Arc::new(schema);
            let decoder = Arc::new(JsonDecoder::new(schema.clone()));
            registry.types.insert(name, RecordType { schema, decoder });
        }
        for (alias, target) in catalog::ALIASES {
            registry.aliases.insert((*alias).to_string(), (*target).to_string());
        }
        registry
    }

    /// Register a JSON-decoded record type.
    pub fn register(&mut self, schema: RecordSchema) -> Result<(), ConfigError> {
        let schema = Arc::new(schema);
        let decoder = Arc::new(JsonDecoder::new(schema.clone()));
        self.register_with(schema, decoder)
    }

    /// Register a record type with its own decoder.
    pub fn register_with(
        &mut self,
        schema: Arc<RecordSchema>,
        decoder: Arc<dyn RecordDecoder>,
    ) -> Result<(), ConfigError> {
        let name = schema.name.clone();
        if name.trim().is_empty() {
            return Err(ConfigError::invalid("record_types.name", "must not be empty"));
        }
        if self.types.contains_key(&name) || self.aliases.contains_key(&name) {
            return Err(ConfigError::DuplicateRecordType { record_type: name });
        }
        tracing::debug!(record_type = %name, fields = schema.fields.len(), "record type registered");
        self.types.insert(name, RecordType { schema, decoder });
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<&RecordType, ConfigError> {
        let target = self.aliases.get(name).map(String::as_str).unwrap_or(name);
        self.types.get(target).ok_or_else(|| ConfigError::UnknownRecordType {
            name: name.to_string(),
            known: self.names().collect::<Vec<_>>().join(", "),
        })
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.types.keys().map(String::as_str)
    }
}
