//! Oplog consumer engine.
//!
//! A [`Consumer`] keeps an event stream open against an oplog, hands decoded
//! operations to the caller and tracks which of them were acknowledged. The
//! position persisted to the state file only ever moves to an operation once
//! every operation delivered before it has been acknowledged, so a restart
//! never skips unfinished work.
//!
//! Running a consumer involves one task per concern:
//! - the read loop connects, decodes and delivers, reconnecting with backoff
//! - the control loop applies acknowledgements to the in-flight ledger
//! - the save loop persists the position periodically
//!
//! # Example
//!
//! ```ignore
//! use oplogc::consumer::{Consumer, ConsumerOptions};
//!
//! let consumer = Consumer::subscribe(
//!     "https://oplog.example.com/",
//!     ConsumerOptions::default().with_state_file("oplog.state"),
//! );
//! let mut subscription = consumer.start();
//! while let Some(delivery) = subscription.operations.recv().await {
//!     handle(&delivery.operation).await;
//!     delivery.done();
//! }
//! ```

mod ack;
mod backoff;
mod options;
mod state;

pub use ack::{AckHandle, Delivery};
pub use backoff::{BackoffPolicy, LinkEvent, LinkState};
pub use options::{ConsumerOptions, Filter};

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::adapters::{FilePositionStore, ReqwestHttpClient};
use crate::error::{ConsumerError, ConsumerResult};
use crate::ledger::InFlightLedger;
use crate::sse::Decoder;
use crate::traits::{ByteStream, Headers, HttpClient, PositionStore};

use ack::Ack;
use state::ConsumerState;

/// Channels of a running consumer.
///
/// Dropping `operations` stops the consumer. `done` resolves once every
/// consumer task has exited after [`Consumer::stop`].
#[derive(Debug)]
pub struct Subscription {
    /// Decoded operations, in stream order
    pub operations: mpsc::Receiver<Delivery>,
    /// Errors, reported as they happen
    pub errors: mpsc::Receiver<ConsumerError>,
    /// Resolves when the consumer is fully stopped
    pub done: oneshot::Receiver<()>,
}

/// Handle on an oplog subscription.
///
/// Cloning the handle is cheap; all clones drive the same subscription.
#[derive(Clone)]
pub struct Consumer {
    inner: Arc<Inner>,
}

struct Inner {
    url: String,
    options: ConsumerOptions,
    http: Arc<dyn HttpClient>,
    store: Arc<dyn PositionStore>,
    state: ConsumerState,
    shutdown: Mutex<Option<watch::Sender<bool>>>,
}

/// How a stream ended.
enum StreamEnd {
    Shutdown,
    Failed(ConsumerError),
}

impl Consumer {
    /// Create a consumer for the oplog at `url`.
    ///
    /// Nothing happens until [`start`](Self::start) is called.
    pub fn subscribe(url: &str, options: ConsumerOptions) -> Self {
        let store = FilePositionStore::new(options.state_file.clone(), options.allow_replication);
        Self::with_transport(
            url,
            options,
            Arc::new(ReqwestHttpClient::new()),
            Arc::new(store),
        )
    }

    /// Create a consumer with explicit HTTP and position store
    /// implementations.
    pub fn with_transport(
        url: &str,
        options: ConsumerOptions,
        http: Arc<dyn HttpClient>,
        store: Arc<dyn PositionStore>,
    ) -> Self {
        let url = options.filter.apply(url);
        Self {
            inner: Arc::new(Inner {
                url,
                options,
                http,
                store,
                state: ConsumerState::new(),
                shutdown: Mutex::new(None),
            }),
        }
    }

    /// The subscription URL, filter included.
    pub fn url(&self) -> &str {
        &self.inner.url
    }

    /// Start consuming.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics if the consumer is already running.
    pub fn start(&self) -> Subscription {
        if self.inner.state.set_processing(true) {
            panic!("Can't run two consumer loops in parallel");
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        *self.inner.shutdown.lock() = Some(shutdown_tx);

        let capacity = self.inner.options.channel_capacity.max(1);
        let (operations_tx, operations_rx) = mpsc::channel(capacity);
        let (errors_tx, errors_rx) = mpsc::channel(capacity);
        let (done_tx, done_rx) = oneshot::channel();

        info!(url = %self.inner.url, "Starting oplog consumer");
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            inner.run(operations_tx, errors_tx, shutdown_rx).await;
            let _ = done_tx.send(());
        });

        Subscription {
            operations: operations_rx,
            errors: errors_rx,
            done: done_rx,
        }
    }

    /// Ask the consumer to stop. Await [`Subscription::done`] to know when
    /// it has.
    ///
    /// Calling it while stopped or more than once has no effect.
    pub fn stop(&self) {
        self.inner.request_stop();
    }

    /// Returns true between [`start`](Self::start) and the end of shutdown.
    pub fn is_running(&self) -> bool {
        self.inner.state.is_processing()
    }

    /// Id of the newest operation all previous operations of which were
    /// acknowledged. Empty until a position is loaded or set.
    pub fn position(&self) -> String {
        self.inner.state.position()
    }

    /// Move the position, e.g. to `"0"` to replay the whole oplog after a
    /// failed resume.
    ///
    /// The new position is persisted and used from the next connection on.
    pub fn set_position(&self, id: &str) {
        info!(position = id, "Position set");
        self.inner.state.advance(id);
    }
}

/// Resolves once stopping was requested.
async fn stopped(shutdown: &mut watch::Receiver<bool>) {
    // A dropped sender means stop too
    let _ = shutdown.wait_for(|stop| *stop).await;
}

/// Authorization header value for `password`.
fn basic_auth(password: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!(":{}", password)))
}

/// Sends errors to the caller, giving up when the consumer stops.
#[derive(Clone)]
struct ErrorReporter {
    errors: mpsc::Sender<ConsumerError>,
    shutdown: watch::Receiver<bool>,
}

impl ErrorReporter {
    async fn report(&self, err: ConsumerError) {
        warn!(category = %err.category(), "{}", err);
        let mut shutdown = self.shutdown.clone();
        tokio::select! {
            sent = self.errors.send(err) => {
                if sent.is_err() {
                    debug!("Error receiver dropped");
                }
            }
            _ = stopped(&mut shutdown) => {}
        }
    }

    /// Report without waiting for room in the channel.
    fn report_now(&self, err: ConsumerError) {
        warn!(category = %err.category(), "{}", err);
        if self.errors.try_send(err).is_err() {
            debug!("Error channel full or closed");
        }
    }
}

impl Inner {
    fn request_stop(&self) {
        if let Some(shutdown) = self.shutdown.lock().take() {
            info!("Stopping oplog consumer");
            shutdown.send_replace(true);
        }
    }

    async fn run(
        self: Arc<Self>,
        operations: mpsc::Sender<Delivery>,
        errors: mpsc::Sender<ConsumerError>,
        shutdown: watch::Receiver<bool>,
    ) {
        let reporter = ErrorReporter {
            errors,
            shutdown: shutdown.clone(),
        };

        match self.store.load().await {
            Ok(position) => {
                info!(position = %position, "Loaded position");
                self.state.restore(&position);
            }
            Err(err) => {
                error!("Failed to load position: {}", err);
                reporter.report(err.into()).await;
                self.request_stop();
                self.state.set_processing(false);
                return;
            }
        }

        let ledger = Arc::new(InFlightLedger::new());
        let (acks_tx, acks_rx) = mpsc::unbounded_channel();

        let reader = tokio::spawn(Arc::clone(&self).read_loop(
            operations,
            reporter.clone(),
            Arc::clone(&ledger),
            acks_tx,
            shutdown.clone(),
        ));
        let saver = self.store.is_persistent().then(|| {
            tokio::spawn(Arc::clone(&self).save_loop(reporter.clone(), shutdown.clone()))
        });

        self.control_loop(acks_rx, &ledger, shutdown).await;

        if let Err(e) = reader.await {
            error!("Read loop failed: {}", e);
        }
        if let Some(saver) = saver {
            if let Err(e) = saver.await {
                error!("Save loop failed: {}", e);
            }
            if let Err(err) = self.flush().await {
                reporter.report_now(err);
            }
        }

        self.state.set_processing(false);
        info!(position = %self.state.position(), "Oplog consumer stopped");
    }

    async fn read_loop(
        self: Arc<Self>,
        operations: mpsc::Sender<Delivery>,
        reporter: ErrorReporter,
        ledger: Arc<InFlightLedger>,
        acks: mpsc::UnboundedSender<Ack>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let policy = self.options.backoff;
        let mut link = LinkState::Connecting;
        let mut revision = self.state.subscribe();

        loop {
            revision.borrow_and_update();
            let connected = tokio::select! {
                result = self.connect() => result,
                _ = stopped(&mut shutdown) => return,
            };

            match connected {
                Ok(body) => {
                    link = link.next(LinkEvent::Connected, &policy);
                    info!(url = %self.url, "Connected to oplog");
                    let decoder = Decoder::new(body);
                    match self
                        .stream(decoder, &operations, &ledger, &acks, &mut shutdown)
                        .await
                    {
                        StreamEnd::Shutdown => return,
                        StreamEnd::Failed(err) => reporter.report(err).await,
                    }
                }
                Err(err) => {
                    let wait_for_position = err.requires_caller_action();
                    reporter.report(err).await;
                    if wait_for_position {
                        info!("Waiting for a new position before reconnecting");
                        tokio::select! {
                            _ = revision.changed() => {}
                            _ = stopped(&mut shutdown) => return,
                        }
                    }
                }
            }

            link = link.next(LinkEvent::Failed, &policy);
            let delay = link.delay().unwrap_or(policy.initial);
            info!(?delay, "Reconnecting to oplog");
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = stopped(&mut shutdown) => return,
            }
        }
    }

    /// Open the event stream from the current position.
    async fn connect(&self) -> ConsumerResult<ByteStream> {
        let position = self.state.position();

        let mut headers = Headers::new();
        headers.insert("Cache-Control".to_string(), "no-cache".to_string());
        headers.insert("Accept".to_string(), "text/event-stream".to_string());
        if !position.is_empty() {
            headers.insert("Last-Event-ID".to_string(), position.clone());
        }
        if let Some(password) = self.options.password.as_deref().filter(|p| !p.is_empty()) {
            headers.insert("Authorization".to_string(), basic_auth(password));
        }

        debug!(url = %self.url, position = %position, "Connecting to oplog");
        let response = self.http.get_stream(&self.url, &headers).await?;

        if !position.is_empty() && response.header("Last-Event-ID") != Some(position.as_str()) {
            return Err(ConsumerError::ResumeFailed {
                requested: position,
            });
        }

        match response.status {
            200 => Ok(response.body),
            401 | 403 => Err(ConsumerError::AccessDenied),
            status => Err(ConsumerError::Http {
                status,
                body: response.text().await,
            }),
        }
    }

    /// Deliver operations from one connection until it fails or the
    /// consumer stops. Dropping the decoder closes the connection.
    async fn stream(
        &self,
        mut decoder: Decoder,
        operations: &mpsc::Sender<Delivery>,
        ledger: &InFlightLedger,
        acks: &mpsc::UnboundedSender<Ack>,
        shutdown: &mut watch::Receiver<bool>,
    ) -> StreamEnd {
        loop {
            let operation = tokio::select! {
                decoded = decoder.next() => match decoded {
                    Ok(operation) => operation,
                    Err(err) => return StreamEnd::Failed(err),
                },
                _ = stopped(shutdown) => return StreamEnd::Shutdown,
            };

            // Operations without an id are never acknowledged into the
            // position, but still wait behind a pending reset
            if operation.id.is_empty() {
                tokio::select! {
                    _ = ledger.wait_unlocked() => {}
                    _ = stopped(shutdown) => return StreamEnd::Shutdown,
                }
            } else {
                tokio::select! {
                    _ = ledger.push(&operation.id) => {}
                    _ = stopped(shutdown) => return StreamEnd::Shutdown,
                }
            }
            if operation.is_reset() {
                ledger.lock();
            }

            debug!(id = %operation.id, event = %operation.event, "Delivering operation");
            let delivery = Delivery::new(operation, acks.clone());
            tokio::select! {
                sent = operations.send(delivery) => {
                    if sent.is_err() {
                        warn!("Operations receiver dropped, stopping consumer");
                        self.request_stop();
                        return StreamEnd::Shutdown;
                    }
                }
                _ = stopped(shutdown) => return StreamEnd::Shutdown,
            }
        }
    }

    async fn control_loop(
        &self,
        mut acks: mpsc::UnboundedReceiver<Ack>,
        ledger: &InFlightLedger,
        mut shutdown: watch::Receiver<bool>,
    ) {
        loop {
            tokio::select! {
                biased;
                _ = stopped(&mut shutdown) => break,
                ack = acks.recv() => match ack {
                    Some(ack) => self.acknowledge(ack, ledger),
                    None => {
                        stopped(&mut shutdown).await;
                        break;
                    }
                },
            }
        }

        // Acknowledgements sent before the stop still count for the final flush
        while let Ok(ack) = acks.try_recv() {
            self.acknowledge(ack, ledger);
        }
    }

    fn acknowledge(&self, ack: Ack, ledger: &InFlightLedger) {
        if ack.reset {
            debug!("Reset acknowledged, resuming delivery");
            ledger.unlock();
        }
        if ack.id.is_empty() {
            return;
        }
        match ledger.pull(&ack.id) {
            Some(0) => {
                self.state.advance(&ack.id);
                debug!(position = %ack.id, "Position advanced");
            }
            Some(_) => {}
            None => debug!(id = %ack.id, "Acknowledged operation was not in flight"),
        }
    }

    async fn save_loop(self: Arc<Self>, reporter: ErrorReporter, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.options.save_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = stopped(&mut shutdown) => return,
            }
            if let Err(err) = self.flush().await {
                reporter.report(err).await;
            }
        }
    }

    /// Persist the position if it changed since the last save.
    async fn flush(&self) -> ConsumerResult<()> {
        let (position, saved) = self.state.snapshot();
        if saved {
            return Ok(());
        }
        match self.store.save(&position).await {
            Ok(()) => {
                self.state.mark_saved(&position);
                debug!(position = %position, "Position saved");
                Ok(())
            }
            Err(err) => {
                error!(position = %position, "Failed to save position: {}", err);
                Err(err.into())
            }
        }
    }
}
