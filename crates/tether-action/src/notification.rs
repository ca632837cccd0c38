//! Notification services: observers of proxy state transitions.
//!
//! A proxy reports each transition synchronously, in order, from the task
//! running it. A slow service slows that task down; services that need to
//! do real work should hand it off.

use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::proxy::ProxyView;
use crate::types::{ActionState, CompletionStatus};

/// Sink for proxy state transitions.
pub trait NotificationService: Send + Sync {
    fn action_state_changed(&self, proxy: &dyn ProxyView, state: ActionState);
}

/// Discards every notification.
#[derive(Debug, Default, Clone)]
pub struct NoopNotifications;

impl NotificationService for NoopNotifications {
    fn action_state_changed(&self, _proxy: &dyn ProxyView, _state: ActionState) {}
}

/// Logs every transition through `tracing`.
#[derive(Debug, Default, Clone)]
pub struct LoggingNotifications;

impl NotificationService for LoggingNotifications {
    fn action_state_changed(&self, proxy: &dyn ProxyView, state: ActionState) {
        match state {
            ActionState::Finished => tracing::info!(
                proxy = %proxy.id(),
                action = proxy.action_name(),
                state = %state,
                status = %proxy.completion_status(),
                "Action state changed"
            ),
            _ => tracing::debug!(
                proxy = %proxy.id(),
                action = proxy.action_name(),
                state = %state,
                "Action state changed"
            ),
        }
    }
}

/// One recorded transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateChange {
    pub proxy_id: Uuid,
    pub action: String,
    pub state: ActionState,
    pub completion_status: CompletionStatus,
}

/// Collects every transition in arrival order.
#[derive(Debug, Default)]
pub struct RecordingNotifications {
    changes: Mutex<Vec<StateChange>>,
}

impl RecordingNotifications {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn changes(&self) -> Vec<StateChange> {
        self.lock().clone()
    }

    /// Transitions reported for one proxy, in order.
    pub fn for_proxy(&self, proxy_id: Uuid) -> Vec<StateChange> {
        self.lock()
            .iter()
            .filter(|c| c.proxy_id == proxy_id)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<StateChange>> {
        self.changes.lock().unwrap_or_else(|p| p.into_inner())
    }
}

impl NotificationService for RecordingNotifications {
    fn action_state_changed(&self, proxy: &dyn ProxyView, state: ActionState) {
        self.lock().push(StateChange {
            proxy_id: proxy.id(),
            action: proxy.action_name().to_string(),
            state,
            completion_status: proxy.completion_status(),
        });
    }
}

/// Forwards each transition to several services in registration order.
#[derive(Default, Clone)]
pub struct FanoutNotifications {
    services: Vec<Arc<dyn NotificationService>>,
}

impl FanoutNotifications {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, service: Arc<dyn NotificationService>) -> Self {
        self.services.push(service);
        self
    }

    pub fn add(&mut self, service: Arc<dyn NotificationService>) {
        self.services.push(service);
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

impl NotificationService for FanoutNotifications {
    fn action_state_changed(&self, proxy: &dyn ProxyView, state: ActionState) {
        for service in &self.services {
            service.action_state_changed(proxy, state);
        }
    }
}
