use std::collections::HashMap;

use aws_sdk_dynamodb::types::AttributeValue;

use fieldguard_api::{StoreError, Value};

/// Encode a value as a DynamoDB `AttributeValue`.
///
/// Numbers travel as decimal strings (`N`); lists and maps are stored
/// natively (`L`, `M`). Non-finite floats cannot be represented.
pub fn to_attr(v: &Value) -> Result<AttributeValue, StoreError> {
    Ok(match v {
        Value::Null => AttributeValue::Null(true),
        Value::Bool(b) => AttributeValue::Bool(*b),
        Value::Int(i) => AttributeValue::N(i.to_string()),
        Value::Float(f) if f.is_finite() => AttributeValue::N(f.to_string()),
        Value::Float(f) => return Err(StoreError::validation(format!("number {f} is not representable"))),
        Value::String(s) => AttributeValue::S(s.clone()),
        Value::List(items) => AttributeValue::L(items.iter().map(to_attr).collect::<Result<_, _>>()?),
        Value::Map(entries) => {
            let mut m = HashMap::with_capacity(entries.len());
            for (k, v) in entries {
                m.insert(k.clone(), to_attr(v)?);
            }
            AttributeValue::M(m)
        }
    })
}
