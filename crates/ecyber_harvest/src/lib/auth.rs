//! Rendezvous between the harvester and whoever completes the portal's
//! secondary authentication by hand.
//!
//! The harvester holds an [`AuthGate`] and parks on it when the portal shows
//! its identity check. The front end holds the paired [`AuthHandle`], learns
//! about the pending request through [`AuthHandle::requested`] and releases
//! the harvester with [`AuthHandle::confirm`].

use std::sync::Arc;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    AwaitingConfirmation,
    Confirmed,
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Secondary authentication was cancelled")]
    Cancelled,
    #[error("Secondary authentication required but no confirmer is attached")]
    NoConfirmer,
}

/// Creates a gate (harvester side) and its handle (front-end side).
pub fn auth_gate() -> (AuthGate, AuthHandle) {
    let (tx, _) = watch::channel(GateState::Confirmed);
    let state = Arc::new(tx);
    (
        AuthGate {
            state: Arc::clone(&state),
        },
        AuthHandle { state },
    )
}

#[derive(Debug, Clone)]
pub struct AuthGate {
    state: Arc<watch::Sender<GateState>>,
}

impl AuthGate {
    pub fn state(&self) -> GateState {
        *self.state.borrow()
    }

    /// Marks the gate as awaiting confirmation and waits until the front end
    /// confirms, or until `cancel` fires.
    #[tracing::instrument(skip_all)]
    pub async fn request_confirmation(&self, cancel: &CancellationToken) -> Result<(), AuthError> {
        let mut rx = self.state.subscribe();
        self.state.send_replace(GateState::AwaitingConfirmation);
        tracing::info!("Waiting for secondary authentication to be confirmed");

        tokio::select! {
            _ = cancel.cancelled() => {
                self.state.send_replace(GateState::Confirmed);
                Err(AuthError::Cancelled)
            }
            confirmed = rx.wait_for(|s| *s == GateState::Confirmed) => {
                confirmed.map(|_| ()).map_err(|_| AuthError::Cancelled)
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct AuthHandle {
    state: Arc<watch::Sender<GateState>>,
}

impl AuthHandle {
    /// Resolves once the harvester is waiting for confirmation.
    pub async fn requested(&self) {
        let mut rx = self.state.subscribe();
        // the sender lives in `self`, so the channel cannot close here
        let _ = rx
            .wait_for(|s| *s == GateState::AwaitingConfirmation)
            .await;
    }

    /// Releases a waiting harvester. Returns `false` if nothing was waiting.
    pub fn confirm(&self) -> bool {
        self.state.send_if_modified(|state| {
            if *state == GateState::AwaitingConfirmation {
                *state = GateState::Confirmed;
                true
            } else {
                false
            }
        })
    }
}
