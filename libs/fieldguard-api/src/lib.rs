pub mod error;
pub mod plan;
pub mod record;
pub mod schema;
pub mod store;
pub mod value;

pub use error::{DecodeError, SchemaError, StoreError, StoreErrorKind};
pub use plan::{Expressions, FieldWrite, UpdatePlan, VERSION_PLACEHOLDER};
pub use record::TypedRecord;
pub use schema::{Field, FieldRole, FieldType, RecordSchema, ScalarType};
pub use store::{ConditionalStore, StoreFuture};
pub use value::Value;
