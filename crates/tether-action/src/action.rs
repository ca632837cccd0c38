//! The action capability the engine runs.
//!
//! Actions know nothing about proxies, queues or notifications. They
//! implement `execute` and `cancel`; the proxy does the rest.

use async_trait::async_trait;
use tokio::sync::watch;

use crate::error::ActionError;

/// A unit of work supplied by the host.
///
/// # Example
///
/// ```ignore
/// struct Ping { signal: CancelSignal }
///
/// #[async_trait]
/// impl Action for Ping {
///     type Output = ActionResponse;
///
///     fn name(&self) -> &str { "ping" }
///
///     async fn execute(&self) -> Result<ActionResponse, ActionError> {
///         Ok(ActionResponse::new(200))
///     }
///
///     fn cancel(&self) { self.signal.cancel() }
/// }
/// ```
#[async_trait]
pub trait Action: Send + Sync + 'static {
    /// Result produced by a run; opaque to the engine unless a result
    /// mapping interprets it.
    type Output: Send + 'static;

    fn name(&self) -> &str;

    async fn execute(&self) -> Result<Self::Output, ActionError>;

    /// Ask the action to stop.
    ///
    /// May be called at any time: before `execute`, while it runs, after it
    /// returned, and more than once.
    fn cancel(&self);

    /// Statistics about the action's own sub-work, read once after
    /// `execute` returns.
    fn statistics(&self) -> Option<serde_json::Value> {
        None
    }
}

/// Cooperative cancellation flag for action implementations.
///
/// `cancel` is idempotent. Long-running actions can either poll
/// `is_canceled` or race their work against `canceled()`.
#[derive(Debug)]
pub struct CancelSignal {
    tx: watch::Sender<bool>,
}

impl CancelSignal {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx }
    }

    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_canceled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once `cancel` has been called, immediately if it already was.
    pub async fn canceled(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives as long as `self`, so this cannot fail.
        let _ = rx.wait_for(|canceled| *canceled).await;
    }
}

impl Default for CancelSignal {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct Countdown {
        cancels: AtomicUsize,
    }

    #[async_trait]
    impl Action for Countdown {
        type Output = u32;

        fn name(&self) -> &str {
            "countdown"
        }

        async fn execute(&self) -> Result<u32, ActionError> {
            Ok(3)
        }

        fn cancel(&self) {
            self.cancels.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_action_defaults() {
        let action = Countdown {
            cancels: AtomicUsize::new(0),
        };
        assert_eq!(action.name(), "countdown");
        assert!(action.statistics().is_none());
        assert_eq!(action.execute().await.unwrap(), 3);

        action.cancel();
        action.cancel();
        assert_eq!(action.cancels.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_cancel_signal_is_idempotent() {
        let signal = CancelSignal::new();
        assert!(!signal.is_canceled());
        signal.cancel();
        signal.cancel();
        assert!(signal.is_canceled());
    }

    #[tokio::test]
    async fn test_canceled_resolves_when_already_canceled() {
        let signal = CancelSignal::default();
        signal.cancel();
        tokio::time::timeout(Duration::from_secs(1), signal.canceled())
            .await
            .expect("already-canceled signal should resolve immediately");
    }

    #[tokio::test]
    async fn test_canceled_wakes_waiter() {
        let signal = std::sync::Arc::new(CancelSignal::new());
        let waiter = {
            let signal = std::sync::Arc::clone(&signal);
            tokio::spawn(async move { signal.canceled().await })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!waiter.is_finished());

        signal.cancel();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should wake after cancel")
            .unwrap();
    }
}
