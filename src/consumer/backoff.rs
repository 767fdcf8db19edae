//! Reconnection state machine.
//!
//! The read loop is always in one of three link states. Every connection
//! failure moves it to `Reconnecting` with a delay twice as long as the
//! previous one, up to a cap; a successful connection resets it.

use std::time::Duration;

/// Delays between reconnection attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// Delay after the first failure
    pub initial: Duration,
    /// Longest delay between two attempts
    pub max: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial: Duration::from_secs(1),
            max: Duration::from_secs(30),
        }
    }
}

impl BackoffPolicy {
    /// Delay before the given reconnection attempt, counting from 1.
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.initial.saturating_mul(factor).min(self.max)
    }
}

/// What just happened to the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkEvent {
    /// A response was accepted as the event stream
    Connected,
    /// Connecting failed, or the stream broke
    Failed,
}

/// Connection state of the read loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkState {
    /// First connection attempt
    Connecting,
    /// Reading the event stream
    Streaming,
    /// Waiting `delay` before reconnection attempt number `attempt`
    Reconnecting { attempt: u32, delay: Duration },
}

impl LinkState {
    /// State after `event`.
    pub fn next(&self, event: LinkEvent, policy: &BackoffPolicy) -> LinkState {
        match (self, event) {
            (_, LinkEvent::Connected) => LinkState::Streaming,
            (LinkState::Connecting | LinkState::Streaming, LinkEvent::Failed) => {
                LinkState::Reconnecting {
                    attempt: 1,
                    delay: policy.delay(1),
                }
            }
            (LinkState::Reconnecting { attempt, .. }, LinkEvent::Failed) => {
                let attempt = attempt.saturating_add(1);
                LinkState::Reconnecting {
                    attempt,
                    delay: policy.delay(attempt),
                }
            }
        }
    }

    /// How long to wait before the next attempt, if reconnecting.
    pub fn delay(&self) -> Option<Duration> {
        match self {
            LinkState::Reconnecting { delay, .. } => Some(*delay),
            _ => None,
        }
    }
}
