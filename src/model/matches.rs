use std::iter::FusedIterator;
use std::ops::Index;

use serde::Serialize;
use serde_json::Value;

use crate::error::{CombyError, DecodeErrorKind, Result};
use crate::model::decode::{Object, as_array, index_path, key_path, parse_json};
use crate::model::environment::{BoundTerm, Environment, resolve_within};
use crate::model::location::LocationRange;

/// A single match of a template within a source text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Match {
	matched: String,
	#[serde(rename = "range")]
	location: LocationRange,
	environment: Environment,
}

impl Match {
	/// The full text spanned by [`Match::location`].
	pub fn matched(&self) -> &str {
		&self.matched
	}

	pub fn location(&self) -> LocationRange {
		self.location
	}

	pub fn environment(&self) -> &Environment {
		&self.environment
	}

	/// Look up the binding for `term`.
	pub fn get(&self, term: &str) -> Option<&BoundTerm> {
		self.environment.get(term)
	}

	/// Number of bound terms.
	pub fn len(&self) -> usize {
		self.environment.len()
	}

	pub fn is_empty(&self) -> bool {
		self.environment.is_empty()
	}

	pub fn terms(&self) -> impl Iterator<Item = &str> {
		self.environment.terms()
	}

	/// Decode one match object.
	///
	/// Engine JSON carries `{matched, range, environment: [...]}`. The older
	/// server protocol carries `{location: "l:c::l:c", environment: {...}}`
	/// with zero-indexed compact locations and no `matched`; those spans are
	/// resolved against `source` and `matched` is sliced out of it.
	pub(crate) fn decode(obj: &Object<'_>, source: Option<&str>) -> Result<Self> {
		if !obj.contains("range") && obj.contains("location") {
			return Match::decode_legacy(obj, source);
		}
		let matched = obj.string("matched")?.to_string();
		let location = LocationRange::decode(&obj.object("range")?)?;
		let environment =
			Environment::decode(obj.value("environment")?, &key_path(obj.path(), "environment"))?;

		Ok(Match {
			matched,
			location,
			environment,
		})
	}

	fn decode_legacy(obj: &Object<'_>, source: Option<&str>) -> Result<Self> {
		let location_path = key_path(obj.path(), "location");
		let location = resolve_within(
			LocationRange::decode_compact(obj.string("location")?, &location_path)?,
			source,
		);
		let environment = Environment::decode_legacy(&obj.object("environment")?, source)?;

		let matched = if obj.contains("matched") {
			obj.string("matched")?.to_string()
		} else {
			let text = source.and_then(|source| location.slice(source)).ok_or_else(|| {
				CombyError::malformed(
					location_path,
					DecodeErrorKind::InvalidValue,
					format!("range {location} does not fall inside the source text"),
				)
			})?;
			text.to_string()
		};

		Ok(Match {
			matched,
			location,
			environment,
		})
	}

	/// Check that the match and each binding span exactly their text in
	/// `source`, the text originally handed to the engine.
	pub fn verify_against(&self, source: &str) -> Result<()> {
		check_span(source, self.location, &self.matched, "matched")?;
		for binding in &self.environment {
			check_span(
				source,
				binding.location(),
				binding.fragment(),
				&format!("environment.{}", binding.term()),
			)?;
		}
		Ok(())
	}
}

fn check_span(source: &str, range: LocationRange, expected: &str, field: &str) -> Result<()> {
	match range.slice(source) {
		Some(text) if text == expected => Ok(()),
		Some(text) => Err(CombyError::malformed(
			field,
			DecodeErrorKind::InvalidValue,
			format!("range {range} spans {text:?}, response says {expected:?}"),
		)),
		None => Err(CombyError::malformed(
			field,
			DecodeErrorKind::InvalidValue,
			format!("range {range} does not fall inside the source text"),
		)),
	}
}

impl Index<&str> for Match {
	type Output = BoundTerm;

	fn index(&self, term: &str) -> &BoundTerm {
		&self.environment[term]
	}
}

/// The matches returned by one `find_matches` request.
///
/// The engine response is read in full, and the engine released, before a
/// `Matches` is handed out; each item is then decoded on demand. Stopping
/// early is always safe. Items come out in the order the engine reported
/// them. To iterate again, issue the request again.
#[derive(Debug)]
pub struct Matches {
	pending: std::vec::IntoIter<(String, Value)>,
	source: Option<String>,
}

impl Matches {
	/// A sequence with no matches.
	pub fn empty() -> Self {
		Matches {
			pending: Vec::new().into_iter(),
			source: None,
		}
	}

	/// Buffer the binary's `-json-lines` output: one `{uri, matches}` object
	/// per line. Blank output means nothing matched. Items from every line
	/// are yielded in output order.
	pub(crate) fn from_json_lines(output: &str, source: &str) -> Result<Self> {
		let mut pending = Vec::new();
		for (number, line) in output.lines().enumerate() {
			if line.trim().is_empty() {
				continue;
			}
			let line_path = format!("line {}", number + 1);
			let value = parse_json(line, &line_path)?;
			if value.is_null() {
				continue;
			}
			let set = Object::new(&value, line_path.as_str())?;
			let items_path = key_path(&line_path, "matches");
			for (i, item) in set.array("matches")?.iter().enumerate() {
				pending.push((index_path(&items_path, i), item.clone()));
			}
		}
		Ok(Matches::buffered(pending, source))
	}

	/// Buffer an HTTP `/matches` body: a JSON array of match objects.
	pub(crate) fn from_json_array(body: &str, source: &str) -> Result<Self> {
		let value = parse_json(body, "matches")?;
		let pending = as_array(&value, "matches")?
			.iter()
			.enumerate()
			.map(|(i, item)| (index_path("matches", i), item.clone()))
			.collect::<Vec<_>>();
		Ok(Matches::buffered(pending, source))
	}

	fn buffered(pending: Vec<(String, Value)>, source: &str) -> Self {
		Matches {
			pending: pending.into_iter(),
			source: Some(source.to_string()),
		}
	}
}

impl Iterator for Matches {
	type Item = Result<Match>;

	fn next(&mut self) -> Option<Self::Item> {
		let (path, value) = self.pending.next()?;
		let source = self.source.as_deref();
		Some(Object::new(&value, path).and_then(|obj| Match::decode(&obj, source)))
	}

	fn size_hint(&self) -> (usize, Option<usize>) {
		self.pending.size_hint()
	}
}

impl ExactSizeIterator for Matches {}

impl FusedIterator for Matches {}
