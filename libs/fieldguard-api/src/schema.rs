use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ════════════════════════════════════════════════════════════════
//  Scalar Type
// ════════════════════════════════════════════════════════════════

/// Scalar types a record field may declare.
///
/// Each store maps them to its native representation:
/// - DynamoDB: `N` for numbers, `S`, `BOOL`, `M`/`L` for json
/// - memory: `Value` as-is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalarType {
    Bool,
    Int32,
    Int64,
    Float64,
    String,
    /// Semi-structured data: nested maps and lists, stored natively.
    Json,
}

impl std::fmt::Display for ScalarType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScalarType::Bool => write!(f, "bool"),
            ScalarType::Int32 => write!(f, "int32"),
            ScalarType::Int64 => write!(f, "int64"),
            ScalarType::Float64 => write!(f, "float64"),
            ScalarType::String => write!(f, "string"),
            ScalarType::Json => write!(f, "json"),
        }
    }
}

impl FromStr for ScalarType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bool" | "boolean" => Ok(ScalarType::Bool),
            "int32" => Ok(ScalarType::Int32),
            "int64" | "long" => Ok(ScalarType::Int64),
            "float64" | "double" => Ok(ScalarType::Float64),
            "string" => Ok(ScalarType::String),
            "json" => Ok(ScalarType::Json),
            other => Err(format!("unknown scalar type '{other}'")),
        }
    }
}

// ════════════════════════════════════════════════════════════════
//  Field Type
// ════════════════════════════════════════════════════════════════

/// Field type: a scalar or an array of scalars.
///
/// Written in config as `"int64"` or `"array<string>"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum FieldType {
    Scalar(ScalarType),
    Array(ScalarType),
}

impl FieldType {
    pub fn is_integer(&self) -> bool {
        matches!(self, FieldType::Scalar(ScalarType::Int32 | ScalarType::Int64))
    }
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldType::Scalar(s) => write!(f, "{s}"),
            FieldType::Array(s) => write!(f, "array<{s}>"),
        }
    }
}

impl FromStr for FieldType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s.strip_prefix("array<").and_then(|rest| rest.strip_suffix('>')) {
            Some(inner) => Ok(FieldType::Array(inner.parse()?)),
            None => Ok(FieldType::Scalar(s.parse()?)),
        }
    }
}

impl TryFrom<String> for FieldType {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<FieldType> for String {
    fn from(t: FieldType) -> Self {
        t.to_string()
    }
}

// ════════════════════════════════════════════════════════════════
//  Field & RecordSchema
// ════════════════════════════════════════════════════════════════

/// Role a field plays in conditional writes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldRole {
    /// Partition key of the stored item.
    Key,
    /// Logical timestamp of the record; stamped into every shadow attribute.
    Version,
    #[default]
    Payload,
}

/// One field of a record type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub role: FieldRole,
}

impl Field {
    pub fn new(name: impl Into<String>, field_type: FieldType, role: FieldRole) -> Self {
        Self {
            name: name.into(),
            field_type,
            role,
        }
    }

    /// Shortcut: scalar payload field.
    pub fn scalar(name: impl Into<String>, scalar: ScalarType) -> Self {
        Self::new(name, FieldType::Scalar(scalar), FieldRole::Payload)
    }

    /// Shortcut: array payload field.
    pub fn array(name: impl Into<String>, scalar: ScalarType) -> Self {
        Self::new(name, FieldType::Array(scalar), FieldRole::Payload)
    }

    pub fn key(name: impl Into<String>, scalar: ScalarType) -> Self {
        Self::new(name, FieldType::Scalar(scalar), FieldRole::Key)
    }

    pub fn version(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Scalar(ScalarType::Int64), FieldRole::Version)
    }
}

/// Explicit descriptor of a record type: ordered fields with roles.
///
/// Supplied by the record type's definition (built-in catalog or config),
/// resolved once per type, never per record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordSchema {
    pub name: String,
    pub fields: Vec<Field>,
}

impl RecordSchema {
    pub fn new(name: impl Into<String>, fields: Vec<Field>) -> Self {
        Self {
            name: name.into(),
            fields,
        }
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// All fields with the given role, in declaration order.
    pub fn with_role(&self, role: FieldRole) -> impl Iterator<Item = &Field> {
        self.fields.iter().filter(move |f| f.role == role)
    }
}
