//! Built-in record types.

use fieldguard_api::{Field, FieldRole, FieldType, RecordSchema, ScalarType};

pub const DISH: &str = "dish";
pub const ITEM_CATALOG: &str = "item-catalog";
pub const MODEL: &str = "model";

/// Legacy parser names accepted as aliases.
pub const ALIASES: &[(&str, &str)] = &[
    ("DishParser", DISH),
    ("ItemCatalogParser", ITEM_CATALOG),
    ("CustomJsonBase64Parser", MODEL),
];

/// Menu dish keyed by numeric `id`.
pub fn dish() -> RecordSchema {
    use ScalarType::*;
    RecordSchema::new(
        DISH,
        vec![
            Field::key("id", Int64),
            Field::version("version"),
            Field::scalar("storeId", Int64),
            Field::scalar("names", Json),
            Field::scalar("descriptions", Json),
            Field::scalar("taxBaseType", String),
            Field::scalar("displayStatus", String),
            Field::scalar("targetAvailableTime", String),
            Field::scalar("salePrice", Float64),
            Field::scalar("currencyType", String),
            Field::array("imagePaths", String),
            Field::scalar("saleFromAt", String),
            Field::scalar("saleToAt", String),
            Field::scalar("dishOptions", Json),
            Field::scalar("openHours", Json),
            Field::scalar("disposable", Bool),
            Field::scalar("disposablePrice", Float64),
            Field::scalar("deleted", Bool),
            Field::scalar("displayPrice", Float64),
        ],
    )
}

/// Catalog item keyed by `productId`.
pub fn item_catalog() -> RecordSchema {
    use ScalarType::*;
    RecordSchema::new(
        ITEM_CATALOG,
        vec![
            Field::version("version"),
            Field::key("productId", Int64),
            Field::scalar("divisionType", String),
            Field::scalar("name", Json),
            Field::scalar("reconciledAttributes", Json),
            Field::scalar("valid", Bool),
            Field::scalar("createAt", Int64),
            Field::scalar("sequence", Int64),
            Field::scalar("mainImage", String),
        ],
    )
}

/// Minimal example type keyed by a string `id`.
pub fn model() -> RecordSchema {
    use ScalarType::*;
    RecordSchema::new(
        MODEL,
        vec![
            Field::key("id", String),
            Field::new("version", FieldType::Scalar(Int32), FieldRole::Version),
            Field::scalar("dataField", String),
            Field::scalar("description", String),
            Field::scalar("amount", Float64),
        ],
    )
}

pub fn all() -> Vec<RecordSchema> {
    vec![dish(), item_catalog(), model()]
}
