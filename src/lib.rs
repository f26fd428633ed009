//! comby-client - typed access to the Comby structural rewrite engine.
//!
//! This library provides:
//! - The [`Engine`] trait: find matches, rewrite, substitute, version
//! - Transports: a local engine binary, an engine HTTP server, and an
//!   ephemeral server owned by its handle
//! - Typed match results with positions and bound terms
//! - Configuration file parsing and cascade discovery
//!
//! # Example
//!
//! ```no_run
//! use comby_client::{CombyBinary, Engine};
//!
//! let comby = CombyBinary::default();
//! let source = "print('hello world')";
//! for found in comby.find_matches(source, "print(:[1])", Some(".py")).unwrap() {
//!     let found = found.unwrap();
//!     println!("{} at {}: {}", found.matched(), found.location(), found["1"].fragment());
//! }
//! ```

pub mod config;
pub mod model;
pub mod engine;
pub mod error;
pub mod exec;
pub mod telemetry;

pub use crate::model::{
	Arguments, BoundTerm, Environment, Indexing, Location, LocationRange, Match, Matches,
};
pub use engine::{
	ClientState, CombyBinary, CombyHttp, Engine, EphemeralServer, HttpOptions, Rewrite,
	ServerOptions,
};
pub use error::{CombyError, DecodeErrorKind, Result};
