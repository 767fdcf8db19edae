//! Trait abstractions for dependency injection and testability.
//!
//! The consumer engine talks to the outside world through two seams:
//!
//! - [`HttpClient`] - streaming GET against the oplog server
//! - [`PositionStore`] - durable storage of the resume position

pub mod http;
pub mod position;

pub use http::{ByteStream, Headers, HttpClient, HttpError, StreamResponse};
pub use position::{is_valid_position, PositionStore, PositionStoreError, FULL_REPLICATION};
