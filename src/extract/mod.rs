// src/extract/mod.rs
pub mod fields;
pub mod path;
pub mod template;

pub use fields::{map_fields, FieldMap};
pub use path::{extract, JsonPath, PathError};
pub use template::{substitute, PathVariables};

use serde_json::Value;

/// Root-path extraction followed by field mapping, the shape step every protocol shares.
pub fn shape(document: &Value, root_path: &str, fields: &FieldMap) -> Result<Value, PathError> {
    let root = extract(document, root_path)?;
    map_fields(root, fields)
}
