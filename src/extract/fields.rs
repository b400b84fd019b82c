//! Field mapping: reshapes an extracted root through `output field -> path` pairs.

use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};
use std::fmt;

use super::path::{JsonPath, PathError};

/// Ordered `output field -> path expression` pairs, in declared order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldMap(Vec<(String, String)>);

impl FieldMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, field: impl Into<String>, path: impl Into<String>) -> Self {
        self.0.push((field.into(), path.into()));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(f, p)| (f.as_str(), p.as_str()))
    }
}

impl<F: Into<String>, P: Into<String>> FromIterator<(F, P)> for FieldMap {
    fn from_iter<I: IntoIterator<Item = (F, P)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(f, p)| (f.into(), p.into())).collect())
    }
}

impl<'de> Deserialize<'de> for FieldMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct FieldMapVisitor;

        impl<'de> Visitor<'de> for FieldMapVisitor {
            type Value = FieldMap;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a table of output field names to path expressions")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<FieldMap, A::Error> {
                let mut pairs = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((field, path)) = access.next_entry::<String, String>()? {
                    pairs.push((field, path));
                }
                Ok(FieldMap(pairs))
            }
        }

        deserializer.deserialize_map(FieldMapVisitor)
    }
}

/// Applies `fields` to `root`.
///
/// Empty map passes `root` through. A sequence root maps every element; anything else
/// maps once. The first field that fails to resolve fails the whole mapping.
pub fn map_fields(root: Value, fields: &FieldMap) -> Result<Value, PathError> {
    if fields.is_empty() {
        return Ok(root);
    }

    let compiled = fields
        .iter()
        .map(|(field, path)| JsonPath::compile(path).map(|p| (field, p)))
        .collect::<Result<Vec<_>, PathError>>()?;

    match root {
        Value::Array(items) => items
            .iter()
            .map(|item| map_one(item, &compiled))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        other => map_one(&other, &compiled),
    }
}

fn map_one(item: &Value, compiled: &[(&str, JsonPath)]) -> Result<Value, PathError> {
    let mut out = Map::with_capacity(compiled.len());
    for (field, path) in compiled {
        out.insert((*field).to_string(), path.evaluate(item)?);
    }
    Ok(Value::Object(out))
}
