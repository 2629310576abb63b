//! Response composer.
//!
//! Responses are assembled from flat partial results. [`merge`] is a plain
//! field-level union where a later part silently overwrites an earlier part's
//! field of the same name; it never combines values. Callers order the parts
//! so that no collision drops data they need.

use json::Value;
use serde::Serialize;

use crate::prelude::*;

pub type Fields = json::Map<String, Value>;

pub fn merge(parts: impl IntoIterator<Item = Fields>) -> Fields {
  let mut merged = Fields::new();
  for part in parts {
    merged.extend(part);
  }
  merged
}

/// Serializes a struct into its top-level fields.
pub fn fields<T: Serialize>(value: &T) -> Result<Fields> {
  match json::to_value(value)? {
    Value::Object(map) => Ok(map),
    other => Err(Error::Internal(format!("expected an object, got {other}"))),
  }
}

/// A part holding a single named field.
pub fn field(name: &str, value: impl Serialize) -> Result<Fields> {
  let mut part = Fields::new();
  part.insert(name.to_string(), json::to_value(value)?);
  Ok(part)
}
