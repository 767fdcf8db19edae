//! Mock implementations for testing.
//!
//! This module provides mock implementations of all trait abstractions,
//! enabling consumer tests without network access or file system access.
//!
//! # Available Mocks
//!
//! - [`MockHttpClient`] - scripted streaming responses, recorded requests
//! - [`InMemoryPositionStore`] - in-memory position with save history

pub mod http;
pub mod position;

pub use http::{MockHttpClient, MockResponse, RecordedRequest};
pub use position::InMemoryPositionStore;
