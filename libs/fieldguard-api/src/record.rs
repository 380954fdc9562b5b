use crate::value::Value;

/// A decoded record: ordered field name → value pairs.
///
/// Which field is the key and which is the version is not stored here;
/// that comes from the record type's `RecordSchema`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TypedRecord {
    fields: Vec<(String, Value)>,
}

impl TypedRecord {
    pub fn new() -> Self {
        Self { fields: Vec::new() }
    }

    /// Builder-style insert.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    /// Set a field, replacing an existing value in place (order preserved).
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        let value = value.into();
        if let Some(entry) = self.fields.iter_mut().find(|(k, _)| *k == name) {
            entry.1 = value;
        } else {
            self.fields.push((name, value));
        }
    }

    /// Missing fields read as `None`; present-but-null fields as `Some(Value::Null)`.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for TypedRecord {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        let mut record = TypedRecord::new();
        for (k, v) in iter {
            record.set(k, v);
        }
        record
    }
}
