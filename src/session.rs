use std::fmt;

use tokio::sync::broadcast;
use tracing::warn;

const EVENT_CAPACITY: usize = 16;

/// Why a session ended without the host asking for it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExpiryReason {
    /// A request was rejected with 401 and no refresh token was stored.
    MissingRefreshToken,
    /// The refresh exchange failed; carries the rendered cause.
    RefreshFailed(String),
}

impl fmt::Display for ExpiryReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExpiryReason::MissingRefreshToken => write!(f, "missing_refresh_token"),
            ExpiryReason::RefreshFailed(cause) => write!(f, "refresh_failed: {cause}"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionEvent {
    /// The stored session was cleared; the host should send the user back to login.
    Expired { reason: ExpiryReason },
}

/// Fan-out of session lifecycle events to whoever hosts the client.
#[derive(Clone, Debug)]
pub struct SessionEvents {
    tx: broadcast::Sender<SessionEvent>,
}

impl SessionEvents {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(EVENT_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.tx.subscribe()
    }

    pub(crate) fn expired(&self, reason: ExpiryReason) {
        warn!(reason = %reason, "session.expired");
        self.tx.send(SessionEvent::Expired { reason }).ok();
    }
}

impl Default for SessionEvents {
    fn default() -> Self {
        Self::new()
    }
}
