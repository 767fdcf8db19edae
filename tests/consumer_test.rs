//! Integration tests for the consumer engine over the mock transport.
//!
//! Time is virtual (`start_paused`): sleeps and reconnection delays complete
//! instantly once every task is idle, which keeps backoff tests fast and
//! deterministic.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{consumer_with, control, insert, settle, OPLOG_URL};
use oplogc::adapters::mock::{InMemoryPositionStore, MockHttpClient, MockResponse};
use oplogc::adapters::FilePositionStore;
use oplogc::traits::{HttpError, PositionStoreError};
use oplogc::{Consumer, ConsumerError, ConsumerOptions, Filter, Subscription};
use tempfile::TempDir;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::time::{timeout, Instant};

#[tokio::test(start_paused = true)]
async fn test_position_waits_for_oldest_ack() {
    let http = MockHttpClient::new();
    http.push_response(MockResponse::live(&format!(
        "{}{}{}",
        insert("1", "xa"),
        insert("2", "xb"),
        insert("3", "xc")
    )));
    let store = InMemoryPositionStore::new();
    let consumer = consumer_with(&http, &store, ConsumerOptions::default());

    let mut subscription = consumer.start();
    let a = subscription.operations.recv().await.unwrap();
    let b = subscription.operations.recv().await.unwrap();
    let c = subscription.operations.recv().await.unwrap();
    assert_eq!(a.operation.id, "1");
    assert_eq!(b.operation.id, "2");
    assert_eq!(c.operation.id, "3");

    b.done();
    c.done();
    tokio::time::sleep(settle()).await;
    assert_eq!(consumer.position(), "");

    a.done();
    tokio::time::sleep(settle()).await;
    assert_eq!(consumer.position(), "1");

    // Persisted on the next save tick
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(store.saved(), vec!["1"]);

    consumer.stop();
    subscription.done.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_reset_blocks_delivery_until_acknowledged() {
    let http = MockHttpClient::new();
    http.push_response(MockResponse::live(&format!(
        "{}{}",
        control("1", "reset"),
        insert("2", "xa")
    )));
    let store = InMemoryPositionStore::new();
    let consumer = consumer_with(&http, &store, ConsumerOptions::default());

    let mut subscription = consumer.start();
    let reset = subscription.operations.recv().await.unwrap();
    assert!(reset.operation.is_reset());

    let blocked = timeout(Duration::from_millis(500), subscription.operations.recv()).await;
    assert!(blocked.is_err(), "operation delivered before the reset was acknowledged");

    reset.done();
    let next = subscription.operations.recv().await.unwrap();
    assert_eq!(next.operation.id, "2");
    assert_eq!(next.operation.event, "insert");

    consumer.stop();
    subscription.done.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_first_request_has_no_position() {
    let http = MockHttpClient::new();
    http.push_response(MockResponse::live(&control("", "live")));
    let store = InMemoryPositionStore::new();
    let consumer = consumer_with(&http, &store, ConsumerOptions::default());

    let mut subscription = consumer.start();
    let live = subscription.operations.recv().await.unwrap();
    assert!(live.operation.is_live());

    let requests = http.get_requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].url, OPLOG_URL);
    assert_eq!(requests[0].header("Last-Event-ID"), None);

    consumer.stop();
    subscription.done.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_resume_failure_waits_for_new_position() {
    let http = MockHttpClient::new();
    // No Last-Event-ID echo: the server did not resume
    http.push_response(MockResponse::live(&insert("43", "xa")));
    let store = InMemoryPositionStore::with_position("42");
    let consumer = consumer_with(&http, &store, ConsumerOptions::default());

    let mut subscription = consumer.start();
    let err = subscription.errors.recv().await.unwrap();
    assert_eq!(
        err,
        ConsumerError::ResumeFailed {
            requested: "42".to_string()
        }
    );
    assert_eq!(http.get_requests()[0].header("Last-Event-ID"), Some("42"));

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(http.get_requests().len(), 1);
    assert!(matches!(
        subscription.operations.try_recv(),
        Err(TryRecvError::Empty)
    ));

    http.push_response(
        MockResponse::live(&insert("1", "xa")).with_header("Last-Event-ID", "0"),
    );
    consumer.set_position("0");

    let delivery = subscription.operations.recv().await.unwrap();
    assert_eq!(delivery.operation.id, "1");
    assert_eq!(http.get_requests()[1].header("Last-Event-ID"), Some("0"));

    consumer.stop();
    subscription.done.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_reconnect_resumes_from_acknowledged_position() {
    let http = MockHttpClient::new();
    http.push_response(MockResponse::events(&insert("1", "xa")));
    http.push_response(MockResponse::live("").with_header("Last-Event-ID", "1"));
    let store = InMemoryPositionStore::new();
    let consumer = consumer_with(&http, &store, ConsumerOptions::default());

    let mut subscription = consumer.start();
    subscription.operations.recv().await.unwrap().done();
    assert_eq!(
        subscription.errors.recv().await.unwrap(),
        ConsumerError::ConnectionClosed
    );

    http.wait_for_requests(2).await;
    assert_eq!(http.get_requests()[1].header("Last-Event-ID"), Some("1"));

    tokio::time::sleep(settle()).await;
    assert!(subscription.errors.try_recv().is_err());

    consumer.stop();
    subscription.done.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_backoff_doubles_between_failures() {
    let http = MockHttpClient::new();
    http.set_default_response(MockResponse::Error(HttpError::ConnectionFailed(
        "refused".to_string(),
    )));
    let store = InMemoryPositionStore::new();
    let consumer = consumer_with(&http, &store, ConsumerOptions::default());

    let start = Instant::now();
    let mut subscription = consumer.start();

    let mut seen = Vec::new();
    for count in 1..=4 {
        http.wait_for_requests(count).await;
        seen.push(start.elapsed());
    }

    let gaps: Vec<Duration> = seen.windows(2).map(|w| w[1] - w[0]).collect();
    assert!(gaps[0] >= Duration::from_secs(1) && gaps[0] < Duration::from_secs(2));
    assert!(gaps[1] >= Duration::from_secs(2) && gaps[1] < Duration::from_secs(3));
    assert!(gaps[2] >= Duration::from_secs(4) && gaps[2] < Duration::from_secs(5));

    let err = subscription.errors.recv().await.unwrap();
    assert!(matches!(err, ConsumerError::Transport(HttpError::ConnectionFailed(_))));
    assert!(err.is_retryable());

    consumer.stop();
    subscription.done.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_backoff_caps_and_resets_after_success() {
    let http = MockHttpClient::new();
    for _ in 0..7 {
        http.push_response(MockResponse::Error(HttpError::ConnectionFailed(
            "refused".to_string(),
        )));
    }
    // Accepted, then closed right away
    http.push_response(MockResponse::events(""));
    http.set_default_response(MockResponse::Error(HttpError::ConnectionFailed(
        "refused".to_string(),
    )));
    let store = InMemoryPositionStore::new();
    let consumer = consumer_with(&http, &store, ConsumerOptions::default());

    let start = Instant::now();
    let mut subscription = consumer.start();

    let mut seen = Vec::new();
    for count in 1..=9 {
        http.wait_for_requests(count).await;
        seen.push(start.elapsed());
    }

    let gaps: Vec<Duration> = seen.windows(2).map(|w| w[1] - w[0]).collect();
    let expected = [1, 2, 4, 8, 16, 30, 30, 1];
    for (gap, secs) in gaps.iter().zip(expected) {
        assert!(
            *gap >= Duration::from_secs(secs) && *gap < Duration::from_secs(secs + 1),
            "gap {:?}, expected {}s",
            gap,
            secs
        );
    }

    let mut errors = Vec::new();
    while let Ok(err) = subscription.errors.try_recv() {
        errors.push(err);
    }
    assert!(errors.contains(&ConsumerError::ConnectionClosed));

    consumer.stop();
    subscription.done.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_access_denied_is_reported_and_retried() {
    let http = MockHttpClient::new();
    http.push_response(MockResponse::status(401, "unauthorized"));
    http.push_response(MockResponse::live(""));
    let store = InMemoryPositionStore::new();
    let consumer = consumer_with(
        &http,
        &store,
        ConsumerOptions::default().with_password("wrong"),
    );

    let mut subscription = consumer.start();
    let err = subscription.errors.recv().await.unwrap();
    assert_eq!(err, ConsumerError::AccessDenied);
    assert!(err.is_fatal());

    http.wait_for_requests(2).await;
    assert!(http.get_requests()[1].header("Authorization").is_some());

    consumer.stop();
    subscription.done.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_unexpected_status_carries_body() {
    let http = MockHttpClient::new();
    http.push_response(MockResponse::status(503, "maintenance"));
    http.set_default_response(MockResponse::live(""));
    let store = InMemoryPositionStore::new();
    let consumer = consumer_with(&http, &store, ConsumerOptions::default());

    let mut subscription = consumer.start();
    assert_eq!(
        subscription.errors.recv().await.unwrap(),
        ConsumerError::Http {
            status: 503,
            body: "maintenance".to_string()
        }
    );

    consumer.stop();
    subscription.done.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_invalid_event_triggers_reconnect() {
    let http = MockHttpClient::new();
    http.push_response(MockResponse::live("id: 1\nevent: insert\ndata: {oops\n\n"));
    http.set_default_response(MockResponse::live(""));
    let store = InMemoryPositionStore::new();
    let consumer = consumer_with(&http, &store, ConsumerOptions::default());

    let mut subscription = consumer.start();
    let err = subscription.errors.recv().await.unwrap();
    assert!(matches!(err, ConsumerError::InvalidEvent { .. }));

    http.wait_for_requests(2).await;
    assert!(matches!(
        subscription.operations.try_recv(),
        Err(TryRecvError::Empty)
    ));

    consumer.stop();
    subscription.done.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_empty_id_never_moves_position() {
    let http = MockHttpClient::new();
    http.push_response(MockResponse::live(&format!(
        "{}{}",
        control("", "live"),
        insert("7", "xa")
    )));
    let store = InMemoryPositionStore::new();
    let consumer = consumer_with(&http, &store, ConsumerOptions::default());

    let mut subscription = consumer.start();
    let live = subscription.operations.recv().await.unwrap();
    let op = subscription.operations.recv().await.unwrap();

    live.done();
    tokio::time::sleep(settle()).await;
    assert_eq!(consumer.position(), "");

    op.done();
    tokio::time::sleep(settle()).await;
    assert_eq!(consumer.position(), "7");

    consumer.stop();
    subscription.done.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_corrupt_state_stops_before_connecting() {
    let http = MockHttpClient::new();
    let store = InMemoryPositionStore::new();
    store.set_load_error(Some(PositionStoreError::Corrupt {
        content: "garbage".to_string(),
    }));
    let consumer = consumer_with(&http, &store, ConsumerOptions::default());

    let mut subscription = consumer.start();
    assert_eq!(
        subscription.errors.recv().await.unwrap(),
        ConsumerError::CorruptState {
            content: "garbage".to_string()
        }
    );
    subscription.done.await.unwrap();

    assert!(http.get_requests().is_empty());
    assert!(!consumer.is_running());
}

#[tokio::test(start_paused = true)]
async fn test_save_failure_is_reported_and_retried() {
    let http = MockHttpClient::new();
    http.push_response(MockResponse::live(&insert("1", "xa")));
    let store = InMemoryPositionStore::new();
    store.set_save_should_fail(true);
    let consumer = consumer_with(&http, &store, ConsumerOptions::default());

    let mut subscription = consumer.start();
    subscription.operations.recv().await.unwrap().done();

    let err = subscription.errors.recv().await.unwrap();
    assert!(matches!(err, ConsumerError::WritingState { .. }));
    assert!(store.saved().is_empty());

    store.set_save_should_fail(false);
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(store.position(), "1");

    // Nothing left to write once saved
    let attempts = store.save_attempts();
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(store.save_attempts(), attempts);

    consumer.stop();
    subscription.done.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_stop_flushes_position() {
    let http = MockHttpClient::new();
    http.push_response(MockResponse::live(&insert("5", "xa")));
    let store = InMemoryPositionStore::new();
    let consumer = consumer_with(
        &http,
        &store,
        ConsumerOptions::default().with_save_interval(Duration::from_secs(3600)),
    );

    let mut subscription = consumer.start();
    subscription.operations.recv().await.unwrap().done();
    tokio::time::sleep(settle()).await;
    assert!(store.saved().is_empty());

    consumer.stop();
    subscription.done.await.unwrap();
    assert_eq!(store.saved(), vec!["5"]);
}

#[tokio::test(start_paused = true)]
async fn test_stop_closes_connection() {
    let http = MockHttpClient::new();
    http.push_response(MockResponse::live(&insert("1", "xa")));
    let store = InMemoryPositionStore::new();
    let consumer = consumer_with(&http, &store, ConsumerOptions::default());

    let mut subscription = consumer.start();
    subscription.operations.recv().await.unwrap();
    assert_eq!(http.open_bodies(), 1);

    consumer.stop();
    subscription.done.await.unwrap();
    assert_eq!(http.open_bodies(), 0);
    assert!(!consumer.is_running());
}

#[tokio::test(start_paused = true)]
async fn test_dropping_operations_stops_consumer() {
    let http = MockHttpClient::new();
    http.push_response(MockResponse::live(&format!(
        "{}{}",
        insert("1", "xa"),
        insert("2", "xb")
    )));
    let store = InMemoryPositionStore::new();
    let consumer = consumer_with(
        &http,
        &store,
        ConsumerOptions::default().with_channel_capacity(1),
    );

    let Subscription {
        operations,
        errors: _errors,
        done,
    } = consumer.start();
    drop(operations);

    done.await.unwrap();
    assert!(!consumer.is_running());
}

#[tokio::test(start_paused = true)]
async fn test_restart_after_stop() {
    let http = MockHttpClient::new();
    http.push_response(MockResponse::live(&insert("1", "xa")));
    http.push_response(MockResponse::live("").with_header("Last-Event-ID", "1"));
    let store = InMemoryPositionStore::new();
    let consumer = consumer_with(&http, &store, ConsumerOptions::default());

    let mut subscription = consumer.start();
    subscription.operations.recv().await.unwrap().done();
    tokio::time::sleep(settle()).await;
    consumer.stop();
    subscription.done.await.unwrap();
    assert_eq!(store.position(), "1");

    let subscription = consumer.start();
    http.wait_for_requests(2).await;
    assert_eq!(http.get_requests()[1].header("Last-Event-ID"), Some("1"));

    consumer.stop();
    subscription.done.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_filter_is_sent_in_query() {
    let http = MockHttpClient::new();
    http.push_response(MockResponse::live(""));
    let store = InMemoryPositionStore::new();
    let filter = Filter::default()
        .with_types(["video"])
        .with_parents(["user/xl2d"]);
    let consumer = consumer_with(&http, &store, ConsumerOptions::default().with_filter(filter));

    let subscription = consumer.start();
    http.wait_for_requests(1).await;
    assert_eq!(
        http.get_requests()[0].url,
        "http://oplog.test/?parents=user%2Fxl2d&types=video"
    );

    consumer.stop();
    subscription.done.await.unwrap();
}

#[tokio::test]
async fn test_replication_from_missing_state_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("oplog.state");

    let http = MockHttpClient::new();
    http.push_response(
        MockResponse::live(&format!("{}{}", control("", "reset"), insert("545b55c7f095528dd0f3863c", "xa")))
            .with_header("Last-Event-ID", "0"),
    );
    let consumer = Consumer::with_transport(
        OPLOG_URL,
        ConsumerOptions::default().with_save_interval(Duration::from_millis(20)),
        Arc::new(http.clone()),
        Arc::new(FilePositionStore::new(Some(path.clone()), true)),
    );

    let mut subscription = consumer.start();
    let reset = subscription.operations.recv().await.unwrap();
    assert!(reset.operation.is_reset());
    assert_eq!(http.get_requests()[0].header("Last-Event-ID"), Some("0"));
    reset.done();

    subscription.operations.recv().await.unwrap().done();
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(
        tokio::fs::read_to_string(&path).await.unwrap(),
        "545b55c7f095528dd0f3863c"
    );

    consumer.stop();
    subscription.done.await.unwrap();
}
