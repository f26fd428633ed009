//! Field-level access into decoded engine JSON.
//!
//! Every accessor records the dotted path of the value it reads so that a
//! malformed response can be reported against the exact offending field,
//! e.g. `matches[0].range.start.line`.

use serde_json::{Map, Value};

use crate::error::{CombyError, DecodeErrorKind, Result};

/// A JSON object together with its path inside the response.
#[derive(Debug, Clone)]
pub(crate) struct Object<'a> {
	map: &'a Map<String, Value>,
	path: String,
}

/// Parse raw engine output into a JSON value.
pub(crate) fn parse_json(text: &str, path: &str) -> Result<Value> {
	serde_json::from_str(text).map_err(|err| {
		CombyError::malformed(path, DecodeErrorKind::Syntax, err.to_string())
	})
}

/// Extend a path with an object key.
pub(crate) fn key_path(path: &str, key: &str) -> String {
	if path.is_empty() {
		key.to_string()
	} else {
		format!("{path}.{key}")
	}
}

/// Extend a path with an array index.
pub(crate) fn index_path(path: &str, index: usize) -> String {
	format!("{path}[{index}]")
}

fn json_type(value: &Value) -> &'static str {
	match value {
		Value::Null => "null",
		Value::Bool(_) => "boolean",
		Value::Number(_) => "number",
		Value::String(_) => "string",
		Value::Array(_) => "array",
		Value::Object(_) => "object",
	}
}

fn mismatch(path: &str, expected: &str, found: &Value) -> CombyError {
	CombyError::malformed(
		path,
		DecodeErrorKind::TypeMismatch,
		format!("expected {expected}, found {}", json_type(found)),
	)
}

/// Require `value` to be an array.
pub(crate) fn as_array<'a>(value: &'a Value, path: &str) -> Result<&'a [Value]> {
	value
		.as_array()
		.map(Vec::as_slice)
		.ok_or_else(|| mismatch(path, "array", value))
}

impl<'a> Object<'a> {
	/// Require `value` to be an object.
	pub(crate) fn new(value: &'a Value, path: impl Into<String>) -> Result<Self> {
		let path = path.into();
		let map = value
			.as_object()
			.ok_or_else(|| mismatch(&path, "object", value))?;
		Ok(Object { map, path })
	}

	pub(crate) fn path(&self) -> &str {
		&self.path
	}

	pub(crate) fn contains(&self, key: &str) -> bool {
		self.map.contains_key(key)
	}

	/// Every member as a nested object, in document order.
	pub(crate) fn members(&self) -> impl Iterator<Item = Result<(&'a str, Object<'a>)>> + '_ {
		self.map.iter().map(|(key, value)| {
			Object::new(value, key_path(&self.path, key)).map(|obj| (key.as_str(), obj))
		})
	}

	/// Descend into a required nested object.
	pub(crate) fn object(&self, key: &str) -> Result<Object<'a>> {
		Object::new(self.value(key)?, key_path(&self.path, key))
	}

	/// Look up a required key.
	pub(crate) fn value(&self, key: &str) -> Result<&'a Value> {
		self.map.get(key).ok_or_else(|| {
			CombyError::malformed(
				key_path(&self.path, key),
				DecodeErrorKind::MissingField,
				format!("required key `{key}` is absent"),
			)
		})
	}

	pub(crate) fn string(&self, key: &str) -> Result<&'a str> {
		let value = self.value(key)?;
		value
			.as_str()
			.ok_or_else(|| mismatch(&key_path(&self.path, key), "string", value))
	}

	pub(crate) fn index(&self, key: &str) -> Result<usize> {
		let value = self.value(key)?;
		value
			.as_u64()
			.and_then(|n| usize::try_from(n).ok())
			.ok_or_else(|| mismatch(&key_path(&self.path, key), "non-negative integer", value))
	}

	pub(crate) fn array(&self, key: &str) -> Result<&'a [Value]> {
		let value = self.value(key)?;
		as_array(value, &key_path(&self.path, key))
	}
}
