//! Current session, shared across the process.

use std::sync::Arc;

use tokio::sync::watch;

use super::{AuthSession, AuthUser};

/// Session lifecycle transitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    SignedIn(AuthSession),
    TokenRefreshed(AuthSession),
    SignedOut,
}

/// Shared handle to the current session.
///
/// Clones observe the same state. The value only changes through
/// [`AuthState::apply`]; consumers read snapshots or subscribe for changes.
#[derive(Clone)]
pub struct AuthState {
    sender: Arc<watch::Sender<Option<AuthSession>>>,
}

impl AuthState {
    /// Start from a previously stored session, if any.
    #[must_use]
    pub fn new(initial: Option<AuthSession>) -> Self {
        let (sender, _) = watch::channel(initial);
        Self {
            sender: Arc::new(sender),
        }
    }

    #[must_use]
    pub fn signed_out() -> Self {
        Self::new(None)
    }

    pub fn apply(&self, event: AuthEvent) {
        match event {
            AuthEvent::SignedIn(session) => {
                tracing::info!("Signed in as {}", session.user.id);
                self.sender.send_replace(Some(session));
            }
            AuthEvent::TokenRefreshed(session) => {
                tracing::debug!("Access token refreshed for {}", session.user.id);
                self.sender.send_replace(Some(session));
            }
            AuthEvent::SignedOut => {
                tracing::info!("Signed out");
                self.sender.send_replace(None);
            }
        }
    }

    /// Snapshot of the current session.
    #[must_use]
    pub fn session(&self) -> Option<AuthSession> {
        self.sender.borrow().clone()
    }

    #[must_use]
    pub fn user(&self) -> Option<AuthUser> {
        self.sender
            .borrow()
            .as_ref()
            .map(|session| session.user.clone())
    }

    #[must_use]
    pub fn access_token(&self) -> Option<String> {
        self.sender
            .borrow()
            .as_ref()
            .map(|session| session.access_token.clone())
    }

    #[must_use]
    pub fn is_signed_in(&self) -> bool {
        self.sender.borrow().is_some()
    }

    /// Receiver that is notified on every applied event.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Option<AuthSession>> {
        self.sender.subscribe()
    }
}

impl std::fmt::Debug for AuthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthState")
            .field("session", &*self.sender.borrow())
            .finish()
    }
}

impl Default for AuthState {
    fn default() -> Self {
        Self::signed_out()
    }
}
