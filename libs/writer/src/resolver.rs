use fieldguard_api::{FieldRole, FieldType, RecordSchema, ScalarType, SchemaError, TypedRecord, Value};

/// Default suffix of shadow version attributes: `price` → `price_version`.
pub const DEFAULT_SHADOW_SUFFIX: &str = "_version";

/// Key and version roles of one record type, resolved once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSchema {
    record_type: String,
    key_field: String,
    version_field: String,
    shadow_suffix: String,
}

impl ResolvedSchema {
    /// Identify the key and version fields of `schema`.
    ///
    /// Exactly one field per role; the key must be an integer or string, the
    /// version an integer; no field may be named like another payload
    /// field's shadow attribute.
    pub fn resolve(schema: &RecordSchema, shadow_suffix: &str) -> Result<Self, SchemaError> {
        if shadow_suffix.is_empty() {
            return Err(SchemaError::EmptyShadowSuffix);
        }

        let key = single_role(schema, FieldRole::Key, "key")?;
        let version = single_role(schema, FieldRole::Version, "version")?;

        if !matches!(
            key.field_type,
            FieldType::Scalar(ScalarType::Int32 | ScalarType::Int64 | ScalarType::String)
        ) {
            return Err(SchemaError::RoleType {
                record_type: schema.name.clone(),
                role: "key",
                field: key.name.clone(),
                found: key.field_type.to_string(),
            });
        }
        if !version.field_type.is_integer() {
            return Err(SchemaError::RoleType {
                record_type: schema.name.clone(),
                role: "version",
                field: version.name.clone(),
                found: version.field_type.to_string(),
            });
        }

        for owner in schema.with_role(FieldRole::Payload) {
            let shadow = format!("{}{shadow_suffix}", owner.name);
            if let Some(clash) = schema.fields.iter().find(|f| f.name == shadow) {
                return Err(SchemaError::ShadowCollision {
                    field: clash.name.clone(),
                    owner: owner.name.clone(),
                });
            }
        }

        Ok(Self {
            record_type: schema.name.clone(),
            key_field: key.name.clone(),
            version_field: version.name.clone(),
            shadow_suffix: shadow_suffix.to_string(),
        })
    }

    pub fn record_type(&self) -> &str {
        &self.record_type
    }

    pub fn key_field(&self) -> &str {
        &self.key_field
    }

    pub fn version_field(&self) -> &str {
        &self.version_field
    }

    /// Name of the version attribute paired with `field`.
    pub fn shadow_name(&self, field: &str) -> String {
        format!("{field}{}", self.shadow_suffix)
    }

    /// Whether `field` is a payload field (neither key nor version).
    pub fn is_payload(&self, field: &str) -> bool {
        field != self.key_field && field != self.version_field
    }

    /// Extract `(key, version)` from a record instance.
    ///
    /// Null or missing values are errors, never defaulted.
    pub fn identity(&self, record: &TypedRecord) -> Result<(Value, i64), SchemaError> {
        let key = match record.get(&self.key_field) {
            None | Some(Value::Null) => {
                return Err(SchemaError::NullKey { field: self.key_field.clone() });
            }
            Some(v @ (Value::Int(_) | Value::String(_))) => v.clone(),
            Some(other) => {
                return Err(SchemaError::BadKey {
                    field: self.key_field.clone(),
                    found: other.kind(),
                });
            }
        };

        let version = match record.get(&self.version_field) {
            None | Some(Value::Null) => {
                return Err(SchemaError::NullVersion { field: self.version_field.clone() });
            }
            Some(Value::Int(v)) => *v,
            Some(other) => {
                return Err(SchemaError::BadVersion {
                    field: self.version_field.clone(),
                    found: other.kind(),
                });
            }
        };

        Ok((key, version))
    }
}

fn single_role<'a>(
    schema: &'a RecordSchema,
    role: FieldRole,
    label: &'static str,
) -> Result<&'a fieldguard_api::Field, SchemaError> {
    let mut fields = schema.with_role(role);
    let first = fields.next().ok_or_else(|| SchemaError::MissingRole {
        record_type: schema.name.clone(),
        role: label,
    })?;
    if fields.next().is_some() {
        return Err(SchemaError::DuplicateRole {
            record_type: schema.name.clone(),
            role: label,
        });
    }
    Ok(first)
}

#[cfg(test)]
mod tests {
    use super::*;
    use fieldguard_api::Field;

    fn listing() -> RecordSchema {
        RecordSchema::new(
            "listing",
            vec![
                Field::key("key", ScalarType::Int64),
                Field::version("version"),
                Field::scalar("price", ScalarType::Int64),
                Field::scalar("status", ScalarType::String),
            ],
        )
    }

    #[test]
    fn resolves_roles() {
        let r = ResolvedSchema::resolve(&listing(), DEFAULT_SHADOW_SUFFIX).unwrap();
        assert_eq!(r.key_field(), "key");
        assert_eq!(r.version_field(), "version");
        assert_eq!(r.shadow_name("price"), "price_version");
        assert!(r.is_payload("status"));
        assert!(!r.is_payload("version"));
    }

    #[test]
    fn missing_version_role_is_an_error() {
        let mut s = listing();
        s.fields.retain(|f| f.role != FieldRole::Version);
        assert_eq!(
            ResolvedSchema::resolve(&s, DEFAULT_SHADOW_SUFFIX),
            Err(SchemaError::MissingRole { record_type: "listing".into(), role: "version" })
        );
    }

    #[test]
    fn duplicate_key_role_is_an_error() {
        let mut s = listing();
        s.fields.push(Field::key("other", ScalarType::String));
        assert!(matches!(
            ResolvedSchema::resolve(&s, DEFAULT_SHADOW_SUFFIX),
            Err(SchemaError::DuplicateRole { role: "key", .. })
        ));
    }

    #[test]
    fn float_version_is_rejected() {
        let mut s = listing();
        s.fields[1].field_type = FieldType::Scalar(ScalarType::Float64);
        assert!(matches!(
            ResolvedSchema::resolve(&s, DEFAULT_SHADOW_SUFFIX),
            Err(SchemaError::RoleType { role: "version", .. })
        ));
    }

    #[test]
    fn shadow_name_collision_is_rejected() {
        let mut s = listing();
        s.fields.push(Field::scalar("price_version", ScalarType::Int64));
        assert_eq!(
            ResolvedSchema::resolve(&s, DEFAULT_SHADOW_SUFFIX),
            Err(SchemaError::ShadowCollision { field: "price_version".into(), owner: "price".into() })
        );
    }

    #[test]
    fn identity_rejects_nulls() {
        let r = ResolvedSchema::resolve(&listing(), DEFAULT_SHADOW_SUFFIX).unwrap();

        let no_key = TypedRecord::new().with("key", Value::Null).with("version", 1i64);
        assert_eq!(r.identity(&no_key), Err(SchemaError::NullKey { field: "key".into() }));

        let no_version = TypedRecord::new().with("key", 7i64);
        assert_eq!(r.identity(&no_version), Err(SchemaError::NullVersion { field: "version".into() }));

        let text_version = TypedRecord::new().with("key", 7i64).with("version", "2");
        assert!(matches!(r.identity(&text_version), Err(SchemaError::BadVersion { found: "string", .. })));

        let ok = TypedRecord::new().with("key", "sku-1").with("version", 3i64);
        assert_eq!(r.identity(&ok), Ok((Value::from("sku-1"), 3)));
    }
}
