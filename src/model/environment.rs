use std::collections::BTreeMap;
use std::ops::Index;

use serde::Serialize;
use serde_json::Value;

use crate::error::{CombyError, DecodeErrorKind, Result};
use crate::model::decode::{Object, as_array, index_path, key_path};
use crate::model::location::LocationRange;

/// Named substitution arguments passed to `substitute` and `rewrite`,
/// mapping a template hole name to the text that fills it.
pub type Arguments = BTreeMap<String, String>;

/// A binding of a named template hole to a fragment of source code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BoundTerm {
	term: String,
	location: LocationRange,
	fragment: String,
}

impl BoundTerm {
	/// Name of the hole, e.g. `1` for `:[1]`.
	pub fn term(&self) -> &str {
		&self.term
	}

	/// Where the fragment sits in the source text.
	pub fn location(&self) -> LocationRange {
		self.location
	}

	/// The source text bound to the hole.
	pub fn fragment(&self) -> &str {
		&self.fragment
	}

	/// Decode one `{variable, value, range}` entry.
	pub(crate) fn decode(obj: &Object<'_>) -> Result<Self> {
		let term = obj.string("variable")?;
		if term.is_empty() {
			return Err(CombyError::malformed(
				key_path(obj.path(), "variable"),
				DecodeErrorKind::InvalidValue,
				"term name is empty",
			));
		}
		let fragment = obj.string("value")?;
		let location = LocationRange::decode(&obj.object("range")?)?;

		Ok(BoundTerm {
			term: term.to_string(),
			location,
			fragment: fragment.to_string(),
		})
	}

	/// Decode one `{term, location, content}` entry of the older server
	/// protocol, resolving its compact location against `source`.
	pub(crate) fn decode_legacy(obj: &Object<'_>, source: Option<&str>) -> Result<Self> {
		let term = obj.string("term")?;
		if term.is_empty() {
			return Err(CombyError::malformed(
				key_path(obj.path(), "term"),
				DecodeErrorKind::InvalidValue,
				"term name is empty",
			));
		}
		let location = LocationRange::decode_compact(
			obj.string("location")?,
			&key_path(obj.path(), "location"),
		)?;
		let fragment = obj.string("content")?;

		Ok(BoundTerm {
			term: term.to_string(),
			location: resolve_within(location, source),
			fragment: fragment.to_string(),
		})
	}
}

/// Attach byte offsets when the span lies inside `source`.
pub(crate) fn resolve_within(location: LocationRange, source: Option<&str>) -> LocationRange {
	source
		.and_then(|source| location.resolve(source))
		.unwrap_or(location)
}

/// The bindings produced by one match, keyed by term name.
///
/// Iteration follows the order the engine reported the bindings in. A term
/// reported twice keeps its first position and takes the later binding.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Environment {
	bindings: Vec<BoundTerm>,
}

impl Environment {
	/// Build an environment from bindings in engine order.
	pub fn from_bindings(bindings: impl IntoIterator<Item = BoundTerm>) -> Self {
		let mut environment = Environment::default();
		for binding in bindings {
			match environment.position(&binding.term) {
				Some(index) => environment.bindings[index] = binding,
				None => environment.bindings.push(binding),
			}
		}
		environment
	}

	/// Decode the engine's environment list.
	pub(crate) fn decode(entries: &Value, path: &str) -> Result<Self> {
		let entries = as_array(entries, path)?;
		let bindings = entries
			.iter()
			.enumerate()
			.map(|(i, entry)| BoundTerm::decode(&Object::new(entry, index_path(path, i))?))
			.collect::<Result<Vec<_>>>()?;
		Ok(Environment::from_bindings(bindings))
	}

	/// Decode the older protocol's environment: an object keyed by term name.
	pub(crate) fn decode_legacy(entries: &Object<'_>, source: Option<&str>) -> Result<Self> {
		let bindings = entries
			.members()
			.map(|member| BoundTerm::decode_legacy(&member?.1, source))
			.collect::<Result<Vec<_>>>()?;
		Ok(Environment::from_bindings(bindings))
	}

	fn position(&self, term: &str) -> Option<usize> {
		self.bindings.iter().position(|b| b.term == term)
	}

	/// Look up the binding for `term`.
	pub fn get(&self, term: &str) -> Option<&BoundTerm> {
		self.position(term).map(|i| &self.bindings[i])
	}

	pub fn contains(&self, term: &str) -> bool {
		self.position(term).is_some()
	}

	/// Term names in engine order.
	pub fn terms(&self) -> impl Iterator<Item = &str> {
		self.bindings.iter().map(|b| b.term.as_str())
	}

	pub fn iter(&self) -> std::slice::Iter<'_, BoundTerm> {
		self.bindings.iter()
	}

	pub fn len(&self) -> usize {
		self.bindings.len()
	}

	pub fn is_empty(&self) -> bool {
		self.bindings.is_empty()
	}

	/// Term name to fragment, ready to feed back into `substitute`.
	pub fn fragments(&self) -> Arguments {
		self.bindings
			.iter()
			.map(|b| (b.term.clone(), b.fragment.clone()))
			.collect()
	}
}

impl Index<&str> for Environment {
	type Output = BoundTerm;

	/// Panics if `term` is not bound; use [`Environment::get`] otherwise.
	fn index(&self, term: &str) -> &BoundTerm {
		match self.get(term) {
			Some(binding) => binding,
			None => panic!("no binding for term `{term}`"),
		}
	}
}

impl<'a> IntoIterator for &'a Environment {
	type Item = &'a BoundTerm;
	type IntoIter = std::slice::Iter<'a, BoundTerm>;

	fn into_iter(self) -> Self::IntoIter {
		self.bindings.iter()
	}
}
