//! Remote delivery targets

use serde::Deserialize;

/// A remote endpoint batches are delivered to.
///
/// Targets are supplied at connect time and replaced wholesale; the
/// stream never merges target lists.
#[derive(Clone, Deserialize, PartialEq, Eq)]
pub struct StreamTarget {
    /// Base URL of the collection endpoint, e.g. `https://collector.example.com`
    pub host: String,
    /// Credential presented in the auth header of every delivery
    pub auth_token: String,
}

impl StreamTarget {
    /// Build a target from a host and credential.
    pub fn new(host: impl Into<String>, auth_token: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            auth_token: auth_token.into(),
        }
    }
}

// Manual impl so the credential never lands in logs.
impl std::fmt::Debug for StreamTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamTarget")
            .field("host", &self.host)
            .field("auth_token", &"<redacted>")
            .finish()
    }
}
