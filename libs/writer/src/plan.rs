use fieldguard_api::{FieldWrite, SchemaError, TypedRecord, UpdatePlan};

use crate::resolver::ResolvedSchema;

/// Turn one record into its conditional update plan.
///
/// Pure: no I/O, no clock. Key and version are taken from the resolved
/// roles; every other non-null field becomes a write stamped with the
/// record's version. Null fields are left out entirely so they neither
/// clobber stored data nor bump their shadow version. A record with no
/// non-null payload yields an empty plan (a no-op, not an error).
pub fn build_plan(record: &TypedRecord, schema: &ResolvedSchema) -> Result<UpdatePlan, SchemaError> {
    let (key, version) = schema.identity(record)?;
    let mut plan = UpdatePlan::new(schema.key_field(), key, version);

    for (name, value) in record.fields() {
        if !schema.is_payload(name) || value.is_null() {
            continue;
        }
        let shadow = schema.shadow_name(name);
        if record.get(&shadow).is_some_and(|v| !v.is_null()) {
            return Err(SchemaError::ShadowCollision {
                field: shadow,
                owner: name.to_string(),
            });
        }
        plan.push(FieldWrite {
            field: name.to_string(),
            shadow,
            value: value.clone(),
        });
    }

    Ok(plan)
}
