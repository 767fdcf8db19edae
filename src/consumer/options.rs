//! Consumer configuration.
//!
//! Use the builder methods to customize a subscription:
//!
//! ```ignore
//! use oplogc::consumer::{ConsumerOptions, Filter};
//!
//! let options = ConsumerOptions::default()
//!     .with_state_file("/var/lib/myapp/oplog.state")
//!     .with_allow_replication(true)
//!     .with_filter(Filter::default().with_types(["video", "user"]));
//! ```

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use super::backoff::BackoffPolicy;

/// Filters applied by the oplog server before streaming.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter {
    /// Object types to stream
    pub types: Vec<String>,
    /// Parents (`type/id`) the streamed objects must be related to
    pub parents: Vec<String>,
}

impl Filter {
    /// Restrict to the given object types.
    pub fn with_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.types = types.into_iter().map(Into::into).collect();
        self
    }

    /// Restrict to objects related to the given parents.
    pub fn with_parents<I, S>(mut self, parents: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.parents = parents.into_iter().map(Into::into).collect();
        self
    }

    /// Query string parameters for this filter, without the leading `?`.
    /// Empty when nothing is filtered.
    pub fn query(&self) -> String {
        [("parents", &self.parents), ("types", &self.types)]
            .into_iter()
            .filter_map(|(name, values)| {
                let joined = values
                    .iter()
                    .filter(|v| !v.is_empty())
                    .map(|v| urlencoding::encode(v).into_owned())
                    .collect::<Vec<_>>()
                    .join(",");
                (!joined.is_empty()).then(|| format!("{}={}", name, joined))
            })
            .collect::<Vec<_>>()
            .join("&")
    }

    /// Append the filter to an oplog URL.
    pub fn apply(&self, url: &str) -> String {
        let query = self.query();
        if query.is_empty() {
            return url.to_string();
        }
        let separator = if url.contains('?') { '&' } else { '?' };
        format!("{}{}{}", url, separator, query)
    }
}

/// Configuration of a consumer subscription.
#[derive(Clone)]
pub struct ConsumerOptions {
    /// State file persisting the position. No persistence when `None`.
    pub state_file: Option<PathBuf>,
    /// Replicate the whole oplog when the state file doesn't exist yet.
    /// Otherwise a consumer without state only gets future operations.
    pub allow_replication: bool,
    /// Password of a protected oplog
    pub password: Option<String>,
    /// Server side filtering
    pub filter: Filter,
    /// Delays between reconnection attempts
    pub backoff: BackoffPolicy,
    /// How often a changed position is persisted (default: 1s)
    pub save_interval: Duration,
    /// Capacity of the operations and errors channels (default: 16)
    pub channel_capacity: usize,
}

impl Default for ConsumerOptions {
    fn default() -> Self {
        Self {
            state_file: None,
            allow_replication: false,
            password: None,
            filter: Filter::default(),
            backoff: BackoffPolicy::default(),
            save_interval: Duration::from_secs(1),
            channel_capacity: 16,
        }
    }
}

impl fmt::Debug for ConsumerOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConsumerOptions")
            .field("state_file", &self.state_file)
            .field("allow_replication", &self.allow_replication)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("filter", &self.filter)
            .field("backoff", &self.backoff)
            .field("save_interval", &self.save_interval)
            .field("channel_capacity", &self.channel_capacity)
            .finish()
    }
}

impl ConsumerOptions {
    /// Create options with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Persist the position in the given file.
    pub fn with_state_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.state_file = Some(path.into());
        self
    }

    /// Set whether a missing state file triggers a full replication.
    pub fn with_allow_replication(mut self, allow: bool) -> Self {
        self.allow_replication = allow;
        self
    }

    /// Authenticate with the given password. An empty password disables
    /// authentication.
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        let password = password.into();
        self.password = (!password.is_empty()).then_some(password);
        self
    }

    /// Set the server side filter.
    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = filter;
        self
    }

    /// Set the reconnection delays.
    pub fn with_backoff(mut self, initial: Duration, max: Duration) -> Self {
        self.backoff = BackoffPolicy { initial, max };
        self
    }

    /// Set how often a changed position is persisted.
    pub fn with_save_interval(mut self, interval: Duration) -> Self {
        self.save_interval = interval;
        self
    }

    /// Set the capacity of the operations and errors channels.
    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity.max(1);
        self
    }
}
