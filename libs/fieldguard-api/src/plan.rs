use std::collections::BTreeMap;

use serde::Serialize;

use crate::value::Value;

/// Placeholder carrying the incoming version in every expression.
pub const VERSION_PLACEHOLDER: &str = ":ver";

/// One payload field write: `field = value`, `shadow = version`.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldWrite {
    pub field: String,
    /// Name of the paired version attribute (`<field><suffix>`).
    pub shadow: String,
    pub value: Value,
}

/// Conditional update derived from one record.
///
/// Every write stamps `version` into its shadow attribute and is guarded by
/// `shadow absent OR shadow < version`. The guards are AND-ed: one stale
/// field vetoes the whole item update.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdatePlan {
    key_field: String,
    key: Value,
    version: i64,
    writes: Vec<FieldWrite>,
}

impl UpdatePlan {
    pub fn new(key_field: impl Into<String>, key: Value, version: i64) -> Self {
        Self {
            key_field: key_field.into(),
            key,
            version,
            writes: Vec::new(),
        }
    }

    pub fn push(&mut self, write: FieldWrite) {
        self.writes.push(write);
    }

    pub fn key_field(&self) -> &str {
        &self.key_field
    }

    pub fn key(&self) -> &Value {
        &self.key
    }

    pub fn version(&self) -> i64 {
        self.version
    }

    pub fn writes(&self) -> &[FieldWrite] {
        &self.writes
    }

    /// An empty plan is a no-op: nothing to write, nothing to send.
    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    /// Render the plan into aliased update/condition expressions.
    ///
    /// Field `i` is referenced as `#f{i}`, its shadow as `#s{i}`, its value as
    /// `:f{i}`; raw attribute names only appear in `names`.
    pub fn expressions(&self) -> Expressions {
        let mut sets = Vec::with_capacity(self.writes.len() * 2);
        let mut clauses = Vec::with_capacity(self.writes.len());
        let mut names = BTreeMap::new();
        let mut values = BTreeMap::new();

        values.insert(VERSION_PLACEHOLDER.to_string(), Value::Int(self.version));

        for (i, w) in self.writes.iter().enumerate() {
            let field_alias = format!("#f{i}");
            let shadow_alias = format!("#s{i}");
            let value_ph = format!(":f{i}");

            sets.push(format!("{field_alias} = {value_ph}"));
            sets.push(format!("{shadow_alias} = {VERSION_PLACEHOLDER}"));
            clauses.push(format!(
                "(attribute_not_exists({shadow_alias}) OR {shadow_alias} < {VERSION_PLACEHOLDER})"
            ));

            names.insert(field_alias, w.field.clone());
            names.insert(shadow_alias, w.shadow.clone());
            values.insert(value_ph, w.value.clone());
        }

        Expressions {
            update: format!("SET {}", sets.join(", ")),
            condition: clauses.join(" AND "),
            clauses,
            names,
            values,
        }
    }
}

/// Wire form of an `UpdatePlan`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Expressions {
    pub update: String,
    pub condition: String,
    /// Per-field clauses, in write order; `condition` is their conjunction.
    #[serde(skip)]
    pub clauses: Vec<String>,
    /// Alias → attribute name.
    pub names: BTreeMap<String, String>,
    /// Placeholder → value.
    pub values: BTreeMap<String, Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan() -> UpdatePlan {
        let mut p = UpdatePlan::new("id", Value::Int(77593296), 2);
        p.push(FieldWrite {
            field: "price".into(),
            shadow: "price_version".into(),
            value: Value::Int(5200),
        });
        p.push(FieldWrite {
            field: "status".into(),
            shadow: "status_version".into(),
            value: Value::from("ON_SALE"),
        });
        p
    }

    #[test]
    fn renders_aliased_expressions() {
        let e = plan().expressions();
        assert_eq!(e.update, "SET #f0 = :f0, #s0 = :ver, #f1 = :f1, #s1 = :ver");
        assert_eq!(
            e.condition,
            "(attribute_not_exists(#s0) OR #s0 < :ver) AND (attribute_not_exists(#s1) OR #s1 < :ver)"
        );
        assert_eq!(e.names["#f1"], "status");
        assert_eq!(e.names["#s0"], "price_version");
        assert_eq!(e.values[":ver"], Value::Int(2));
        assert_eq!(e.values[":f0"], Value::Int(5200));
    }

    #[test]
    fn raw_names_never_appear_in_expressions() {
        let e = plan().expressions();
        for raw in ["price", "status"] {
            assert!(!e.update.contains(raw));
            assert!(!e.condition.contains(raw));
        }
    }
}
