//! Typed values decoded from engine output.
//!
//! This module handles:
//! - Source positions and spans (`Location`, `LocationRange`)
//! - Term bindings and the per-match environment
//! - Matches and the buffered, lazily decoded match sequence

pub(crate) mod decode;
pub mod environment;
pub mod location;
pub mod matches;

pub use environment::{Arguments, BoundTerm, Environment};
pub use location::{Indexing, Location, LocationRange};
pub use matches::{Match, Matches};
