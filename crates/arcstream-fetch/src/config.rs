//! Session configuration.

use serde::{Deserialize, Serialize};

/// Configuration for a [`Session`](crate::Session).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Wait budget in seconds for blocking I/O, reset per pull; 0 disables it.
    pub timeout_secs: u64,
    /// Maximum number of redirects followed per handshake.
    pub max_redirects: usize,
    /// `User-Agent` header value.
    pub user_agent: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 0,
            max_redirects: 10,
            user_agent: format!("arcstream/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}
