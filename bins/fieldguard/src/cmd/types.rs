use fieldguard_api::FieldRole;
use writer::{DEFAULT_SHADOW_SUFFIX, DecoderRegistry, ResolvedSchema};

use crate::config::{FileConfig, TypesArgs};
use crate::error::CliError;

/// Print every registered record type, built-in and configured, and
/// whether it resolves.
pub fn run(args: TypesArgs) -> Result<(), CliError> {
    let cfg = FileConfig::load(args.config.as_deref())?;
    let suffix = cfg.shadow_suffix.as_deref().unwrap_or(DEFAULT_SHADOW_SUFFIX);

    let mut registry = DecoderRegistry::with_builtin();
    for schema in cfg.record_types {
        registry.register(schema)?;
    }

    for name in registry.names() {
        let schema = registry.get(name)?.schema();
        let payload = schema.with_role(FieldRole::Payload).count();
        match ResolvedSchema::resolve(schema, suffix) {
            Ok(r) => println!(
                "{name}\tkey={}\tversion={}\tpayload_fields={payload}",
                r.key_field(),
                r.version_field()
            ),
            Err(e) => println!("{name}\tinvalid: {e}"),
        }
    }
    Ok(())
}
