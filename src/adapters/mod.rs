//! Concrete implementations of trait abstractions.
//!
//! This module provides the production adapters behind the traits defined
//! in `crate::traits`, plus test doubles.
//!
//! # Adapters
//!
//! - [`ReqwestHttpClient`] - streaming HTTP client using reqwest
//! - [`FilePositionStore`] - position persisted to a state file
//!
//! # Mock Implementations
//!
//! The [`mock`] submodule provides test doubles for both seams:
//! - [`mock::MockHttpClient`] - scripted streaming responses
//! - [`mock::InMemoryPositionStore`] - in-memory position storage

pub mod file_position;
pub mod mock;
pub mod reqwest_http;

pub use file_position::FilePositionStore;
pub use mock::{InMemoryPositionStore, MockHttpClient, MockResponse};
pub use reqwest_http::ReqwestHttpClient;
