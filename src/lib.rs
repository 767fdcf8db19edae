//! oplogc - a client for oplog event streams
//!
//! Subscribes to an oplog over Server-Sent Events, hands each operation to
//! the caller and keeps a resumable position that only moves past work the
//! caller has acknowledged.
//!
//! ```ignore
//! use oplogc::{Consumer, ConsumerOptions};
//!
//! let consumer = Consumer::subscribe("https://oplog.example.com/", ConsumerOptions::default());
//! let mut subscription = consumer.start();
//! ```

pub mod adapters;
pub mod cli;
pub mod consumer;
pub mod error;
pub mod ledger;
pub mod operation;
pub mod sse;
pub mod traits;

pub use consumer::{AckHandle, Consumer, ConsumerOptions, Delivery, Filter, Subscription};
pub use error::{ConsumerError, ConsumerResult, ErrorCategory};
pub use ledger::InFlightLedger;
pub use operation::{Operation, OperationData};
