//! Connection settings shared by every operation.
//!
//! [`ConnectionConfig`] is a plain value: operations clone it when they start,
//! so reconfiguring the session never affects a request already in flight.

pub mod io;

use std::time::Duration;

use crate::utils::url::{construct_api_url, ensure_scheme, normalize_base_url};

pub use io::{path_display, ConfigError, Settings};

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:11434";

pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(15);
pub const DEFAULT_CHAT_TIMEOUT: Duration = Duration::from_secs(300);
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    base_url: String,
}

impl ConnectionConfig {
    /// Build a config from user input, adding `http://` if no scheme was given.
    pub fn new(address: &str) -> Self {
        Self {
            base_url: normalize_base_url(&ensure_scheme(address)),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn endpoint(&self, path: &str) -> String {
        construct_api_url(&self.base_url, path)
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

/// Time limits applied per request kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// Listing, deleting, and the connect phase of every request.
    pub connect: Duration,
    /// Whole-duration limit for a streamed chat turn.
    pub chat: Duration,
    /// Connection check.
    pub probe: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            connect: DEFAULT_CONNECT_TIMEOUT,
            chat: DEFAULT_CHAT_TIMEOUT,
            probe: DEFAULT_PROBE_TIMEOUT,
        }
    }
}

impl Timeouts {
    /// Total-duration limit for a request, or `None` when it may run forever.
    pub fn limit_for(&self, policy: TimeoutPolicy) -> Option<Duration> {
        let limit = match policy {
            TimeoutPolicy::Connect => self.connect,
            TimeoutPolicy::Chat => self.chat,
            TimeoutPolicy::Probe => self.probe,
            TimeoutPolicy::Unbounded => return None,
        };
        // A zero duration means "no limit", matching how the settings file spells it.
        (!limit.is_zero()).then_some(limit)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutPolicy {
    Connect,
    Chat,
    Probe,
    /// Downloads: total duration is unbounded.
    Unbounded,
}
