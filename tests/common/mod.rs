//! Common test utilities for integration tests.
//!
//! Builders for event stream bodies and a consumer wired to the mock
//! transport and position store.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use oplogc::adapters::mock::{InMemoryPositionStore, MockHttpClient};
use oplogc::{Consumer, ConsumerOptions};

/// URL every test consumer subscribes to.
pub const OPLOG_URL: &str = "http://oplog.test/";

/// An `insert` record for a video object.
pub fn insert(id: &str, object_id: &str) -> String {
    object_event(id, "insert", object_id)
}

/// A record for a video object with the given event.
pub fn object_event(id: &str, event: &str, object_id: &str) -> String {
    format!(
        "id: {}\nevent: {}\ndata: {{\"timestamp\":\"2014-11-06T13:15:43Z\",\"parents\":[\"user/xl2d\"],\"type\":\"video\",\"id\":\"{}\"}}\n\n",
        id, event, object_id
    )
}

/// A control record (`reset` or `live`).
pub fn control(id: &str, event: &str) -> String {
    if id.is_empty() {
        format!("event: {}\n\n", event)
    } else {
        format!("id: {}\nevent: {}\n\n", id, event)
    }
}

/// Consumer over the given mocks.
pub fn consumer_with(
    http: &MockHttpClient,
    store: &InMemoryPositionStore,
    options: ConsumerOptions,
) -> Consumer {
    Consumer::with_transport(
        OPLOG_URL,
        options,
        Arc::new(http.clone()),
        Arc::new(store.clone()),
    )
}

/// Long enough for every task to react in virtual time, shorter than the
/// first reconnection delay.
pub fn settle() -> Duration {
    Duration::from_millis(100)
}
