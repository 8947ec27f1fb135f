//! Waiting for a game to exit.

use super::events::{StatusSubscribers, SubscriptionId};
use super::MonitorState;
use crate::cancel::CancellationToken;
use crate::error::{GamePulseError, Result};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

/// Removes the subscription however the wait ends.
struct Subscription {
    subscribers: Arc<StatusSubscribers>,
    id: SubscriptionId,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.subscribers.unsubscribe(self.id);
    }
}

/// A registered wait for one game's running→stopped transition.
///
/// Registration happens when the waiter is created, not when it is first
/// polled, so no transition between the two is missed.
pub struct ExitWaiter {
    game_id: i64,
    has_seen_running: bool,
    events: mpsc::UnboundedReceiver<bool>,
    token: CancellationToken,
    _subscription: Subscription,
}

impl ExitWaiter {
    pub(crate) fn register(state: &MonitorState, game_id: i64, token: &CancellationToken) -> Self {
        let (tx, events) = mpsc::unbounded_channel();

        // Seeding and subscribing under the status lock keeps them consistent
        // with the poller, which updates statuses under the same lock.
        let status = state.lock_status();
        let has_seen_running = status.get(game_id) == Some(true);
        let id = state.subscribers.subscribe(move |change| {
            if change.game_id == game_id {
                let _ = tx.send(change.is_running);
            }
        });
        drop(status);

        Self {
            game_id,
            has_seen_running,
            events,
            token: token.clone(),
            _subscription: Subscription {
                subscribers: Arc::clone(&state.subscribers),
                id,
            },
        }
    }

    /// Resolve on the first running→stopped transition.
    ///
    /// A game never seen running first has to be observed starting. Returns
    /// [`GamePulseError::Cancelled`] if the token fires first.
    pub async fn wait(mut self) -> Result<()> {
        loop {
            tokio::select! {
                _ = self.token.cancelled() => {
                    debug!("Exit wait for game {} cancelled", self.game_id);
                    return Err(GamePulseError::Cancelled);
                }
                event = self.events.recv() => match event {
                    Some(true) => self.has_seen_running = true,
                    Some(false) if self.has_seen_running => {
                        debug!("Game {} exited", self.game_id);
                        return Ok(());
                    }
                    Some(false) => {}
                    // The sender lives in the subscription we hold.
                    None => return Err(GamePulseError::Cancelled),
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::GameStatusChange;
    use std::time::Duration;

    fn emit(state: &MonitorState, game_id: i64, is_running: bool) {
        if let Some(change) = state.lock_status().observe(game_id, is_running) {
            state.subscribers.notify(&[change]);
        }
    }

    #[tokio::test]
    async fn test_resolves_after_start_then_stop() {
        let state = MonitorState::default();
        let token = CancellationToken::new();
        let waiter = ExitWaiter::register(&state, 5, &token);

        emit(&state, 5, true);
        emit(&state, 5, false);

        tokio::time::timeout(Duration::from_secs(1), waiter.wait())
            .await
            .expect("waiter should resolve")
            .unwrap();
        assert!(state.subscribers.is_empty());
    }

    #[tokio::test]
    async fn test_stop_without_start_does_not_resolve() {
        let state = MonitorState::default();
        let token = CancellationToken::new();
        let waiter = ExitWaiter::register(&state, 5, &token);

        emit(&state, 5, false);
        emit(&state, 6, true);
        emit(&state, 6, false);

        let result = tokio::time::timeout(Duration::from_millis(50), waiter.wait()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_seeded_from_running_status() {
        let state = MonitorState::default();
        state.lock_status().observe(9, true);

        let token = CancellationToken::new();
        let waiter = ExitWaiter::register(&state, 9, &token);
        state.subscribers.notify(&[GameStatusChange {
            game_id: 9,
            is_running: false,
        }]);

        waiter.wait().await.unwrap();
    }

    #[tokio::test]
    async fn test_cancellation_unsubscribes() {
        let state = MonitorState::default();
        let token = CancellationToken::new();
        let waiter = ExitWaiter::register(&state, 5, &token);
        assert_eq!(state.subscribers.len(), 1);

        token.cancel();
        let err = waiter.wait().await.unwrap_err();
        assert!(err.is_cancelled());
        assert!(state.subscribers.is_empty());
    }
}
