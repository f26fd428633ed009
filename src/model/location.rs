use std::fmt;
use std::str::FromStr;

use serde::ser::{Serialize, SerializeStruct, Serializer};

use crate::error::{CombyError, DecodeErrorKind, Result};
use crate::model::decode::Object;

/// Whether `line` and `column` count from zero or from one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Indexing {
	/// Used by the compact `line:col` strings of the older server protocol.
	ZeroBased,
	/// Used by the engine's JSON output.
	OneBased,
}

/// A single character position within a source text.
///
/// `line` and `column` are kept as the engine reported them, together with
/// their [`Indexing`]. `offset` is the zero-indexed byte offset into the
/// source text; it is absent when the location was parsed from the compact
/// `line:col` form and not resolved against the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Location {
	line: usize,
	column: usize,
	offset: Option<usize>,
	indexing: Indexing,
}

impl Location {
	/// Line number, counted per [`Location::indexing`].
	pub fn line(&self) -> usize {
		self.line
	}

	/// Column number, counted per [`Location::indexing`].
	pub fn column(&self) -> usize {
		self.column
	}

	/// Zero-indexed byte offset, if known.
	pub fn offset(&self) -> Option<usize> {
		self.offset
	}

	pub fn indexing(&self) -> Indexing {
		self.indexing
	}

	/// `(line, column)`, both counted from zero.
	pub fn zero_based(&self) -> (usize, usize) {
		match self.indexing {
			Indexing::ZeroBased => (self.line, self.column),
			Indexing::OneBased => (self.line - 1, self.column - 1),
		}
	}

	/// `(line, column)`, both counted from one.
	pub fn one_based(&self) -> (usize, usize) {
		let (line, column) = self.zero_based();
		(line + 1, column + 1)
	}

	fn checked(
		line: usize,
		column: usize,
		offset: Option<usize>,
		indexing: Indexing,
		field: &str,
	) -> Result<Self> {
		if indexing == Indexing::OneBased && (line == 0 || column == 0) {
			return Err(CombyError::malformed(
				field,
				DecodeErrorKind::InvalidValue,
				format!("line and column are one-indexed, got {line}:{column}"),
			));
		}
		Ok(Location {
			line,
			column,
			offset,
			indexing,
		})
	}

	/// Decode `{line, column, offset}`.
	pub(crate) fn decode(obj: &Object<'_>) -> Result<Self> {
		let line = obj.index("line")?;
		let column = obj.index("column")?;
		let offset = obj.index("offset")?;
		Location::checked(line, column, Some(offset), Indexing::OneBased, obj.path())
	}

	/// Fill in the byte offset by walking `source` to this line and column.
	///
	/// Columns count bytes within the line. Returns `None` when the position
	/// falls outside `source`.
	pub fn resolve(self, source: &str) -> Option<Location> {
		if self.offset.is_some() {
			return Some(self);
		}
		let (line, column) = self.zero_based();
		let line_start = match line {
			0 => 0,
			n => source.match_indices('\n').nth(n - 1)?.0 + 1,
		};
		let line_end = source[line_start..]
			.find('\n')
			.map_or(source.len(), |i| line_start + i);
		let offset = line_start + column;
		(offset <= line_end).then_some(Location {
			offset: Some(offset),
			..self
		})
	}

	/// Whether `self` occurs at or before `other` in document order.
	pub fn is_at_or_before(&self, other: &Location) -> bool {
		match (self.offset, other.offset) {
			(Some(a), Some(b)) => a <= b,
			_ => self.zero_based() <= other.zero_based(),
		}
	}
}

impl FromStr for Location {
	type Err = CombyError;

	/// Parse the compact zero-indexed `line:col` form.
	fn from_str(s: &str) -> Result<Self> {
		let invalid = || {
			CombyError::malformed(
				"location",
				DecodeErrorKind::InvalidValue,
				format!("expected `line:col`, got {s:?}"),
			)
		};
		let (line, column) = s.split_once(':').ok_or_else(invalid)?;
		let line = line.trim().parse().map_err(|_| invalid())?;
		let column = column.trim().parse().map_err(|_| invalid())?;
		Location::checked(line, column, None, Indexing::ZeroBased, "location")
	}
}

impl fmt::Display for Location {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}:{}", self.line, self.column)
	}
}

/// Always one-indexed, whatever the location was decoded from.
impl Serialize for Location {
	fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
		let (line, column) = self.one_based();
		let mut state = serializer.serialize_struct("Location", 3)?;
		state.serialize_field("line", &line)?;
		state.serialize_field("column", &column)?;
		match self.offset {
			Some(offset) => state.serialize_field("offset", &offset)?,
			None => state.skip_field("offset")?,
		}
		state.end()
	}
}

/// A contiguous, half-open span of source text: `stop` is one past the last
/// character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
pub struct LocationRange {
	start: Location,
	#[serde(rename = "end")]
	stop: Location,
}

impl LocationRange {
	/// Build a range, rejecting a `stop` that precedes `start`.
	pub fn new(start: Location, stop: Location) -> Result<Self> {
		if !start.is_at_or_before(&stop) {
			return Err(CombyError::malformed(
				"range",
				DecodeErrorKind::InvalidValue,
				format!("range ends ({stop}) before it starts ({start})"),
			));
		}
		Ok(LocationRange { start, stop })
	}

	pub fn start(&self) -> Location {
		self.start
	}

	pub fn stop(&self) -> Location {
		self.stop
	}

	/// Decode `{start: {...}, end: {...}}`.
	pub(crate) fn decode(obj: &Object<'_>) -> Result<Self> {
		let start = Location::decode(&obj.object("start")?)?;
		let stop = Location::decode(&obj.object("end")?)?;
		LocationRange::new(start, stop).map_err(|err| at_field(err, obj.path()))
	}

	/// Decode a compact `start::stop` string found at `path`.
	pub(crate) fn decode_compact(text: &str, path: &str) -> Result<Self> {
		text.parse().map_err(|err| at_field(err, path))
	}

	/// Fill in both byte offsets from `source`; see [`Location::resolve`].
	pub fn resolve(self, source: &str) -> Option<LocationRange> {
		Some(LocationRange {
			start: self.start.resolve(source)?,
			stop: self.stop.resolve(source)?,
		})
	}

	/// The text this range spans in `source`, when byte offsets are known
	/// and fall on character boundaries.
	pub fn slice<'s>(&self, source: &'s str) -> Option<&'s str> {
		source.get(self.start.offset?..self.stop.offset?)
	}
}

fn at_field(err: CombyError, path: &str) -> CombyError {
	match err {
		CombyError::MalformedResponse { kind, message, .. } => CombyError::MalformedResponse {
			field: path.to_string(),
			kind,
			message,
		},
		other => other,
	}
}

impl FromStr for LocationRange {
	type Err = CombyError;

	/// Parse the compact `start::stop` form, e.g. `0:5::0:9`.
	fn from_str(s: &str) -> Result<Self> {
		let (start, stop) = s.split_once("::").ok_or_else(|| {
			CombyError::malformed(
				"location",
				DecodeErrorKind::InvalidValue,
				format!("expected `start::stop`, got {s:?}"),
			)
		})?;
		LocationRange::new(start.parse()?, stop.parse()?)
	}
}

impl fmt::Display for LocationRange {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}::{}", self.start, self.stop)
	}
}
