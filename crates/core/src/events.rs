//! Session lifecycle events
//!
//! Components publish authentication transitions here without depending on
//! whoever listens for them (a UI, the CLI, tests).

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

/// Why a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogoutReason {
    /// The user asked to sign out
    UserRequested,
    /// The stored credential had already expired
    TokenExpired,
    /// Renewing the credential failed
    RefreshFailed,
}

impl LogoutReason {
    /// Whether the session ended without the user asking for it
    #[must_use]
    pub fn is_forced(self) -> bool {
        !matches!(self, LogoutReason::UserRequested)
    }
}

/// Authentication state transitions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionEvent {
    /// A credential was obtained through login or registration
    LoggedIn,
    /// The credential was renewed
    Refreshed,
    /// The session ended and all session-scoped state was dropped
    LoggedOut { reason: LogoutReason },
}

/// Broadcast channel for session events
#[derive(Debug, Clone)]
pub struct SessionEvents {
    sender: broadcast::Sender<SessionEvent>,
}

impl SessionEvents {
    /// Create a channel buffering up to `capacity` events per subscriber
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish an event; having no subscribers is not an error
    pub fn publish(&self, event: SessionEvent) {
        debug!(?event, subscribers = self.sender.receiver_count(), "session_event");
        let _ = self.sender.send(event);
    }

    /// Subscribe to events published from now on
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.sender.subscribe()
    }
}

impl Default for SessionEvents {
    fn default() -> Self {
        Self::new(64)
    }
}
