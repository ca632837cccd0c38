//! Engine facade: builds proxies and hands them to the run queue.

use std::sync::Arc;

use tether_core::config::TetherConfig;
use tracing::info;

use crate::action::Action;
use crate::error::EngineError;
use crate::mapping::{AcceptAll, ResultMapping, StatusCodeMapping, StatusCoded};
use crate::notification::{LoggingNotifications, NoopNotifications, NotificationService};
use crate::proxy::{ActionProxy, CompletionCallback};
use crate::queue::ActionQueue;

/// Schedules actions onto a shared run queue with one notification service.
pub struct ActionEngine {
    queue: ActionQueue,
    notifications: Arc<dyn NotificationService>,
    status_mapping: StatusCodeMapping,
}

impl ActionEngine {
    /// Build an engine from configuration.
    ///
    /// Without a host-supplied service, transitions are logged (or dropped
    /// when `notifications.log_transitions` is off), unless
    /// `notifications.required` is set, which makes a missing service an
    /// error.
    pub fn new(
        config: &TetherConfig,
        notifications: Option<Arc<dyn NotificationService>>,
    ) -> Result<Self, EngineError> {
        let notifications = match notifications {
            Some(service) => service,
            None if config.notifications.required => {
                return Err(EngineError::MissingNotificationService)
            }
            None if config.notifications.log_transitions => Arc::new(LoggingNotifications),
            None => Arc::new(NoopNotifications),
        };

        info!(
            queue = %config.queue.name,
            max_concurrent = config.queue.max_concurrent,
            success_status_code = config.actions.success_status_code,
            "Action engine ready"
        );

        Ok(Self {
            queue: ActionQueue::from_config(&config.queue),
            notifications,
            status_mapping: StatusCodeMapping::new(config.actions.success_status_code),
        })
    }

    /// Wrap `action` in a proxy that treats every `Ok` as a success and
    /// submit it.
    pub fn schedule<A: Action>(
        &self,
        action: A,
        completion: Option<CompletionCallback>,
    ) -> Result<Arc<ActionProxy<A, AcceptAll>>, EngineError> {
        self.schedule_with_mapping(action, AcceptAll, completion)
    }

    /// Schedule an action whose status code decides success, using the
    /// configured "OK" sentinel.
    pub fn schedule_status_coded<A>(
        &self,
        action: A,
        completion: Option<CompletionCallback>,
    ) -> Result<Arc<ActionProxy<A, StatusCodeMapping>>, EngineError>
    where
        A: Action,
        A::Output: StatusCoded,
    {
        self.schedule_with_mapping(action, self.status_mapping, completion)
    }

    pub fn schedule_with_mapping<A, M>(
        &self,
        action: A,
        mapping: M,
        completion: Option<CompletionCallback>,
    ) -> Result<Arc<ActionProxy<A, M>>, EngineError>
    where
        A: Action,
        M: ResultMapping<A::Output>,
    {
        let proxy = Arc::new(ActionProxy::with_mapping(
            action,
            mapping,
            Arc::clone(&self.notifications),
            completion,
        ));
        self.queue.submit(proxy.clone())?;
        Ok(proxy)
    }

    pub fn queue(&self) -> &ActionQueue {
        &self.queue
    }

    pub fn cancel_all(&self) -> usize {
        self.queue.cancel_all()
    }

    pub async fn wait_idle(&self) {
        self.queue.wait_idle().await
    }

    pub async fn shutdown(&self) {
        self.queue.shutdown().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ActionError;
    use crate::mapping::ActionResponse;
    use crate::notification::RecordingNotifications;
    use crate::proxy::ProxyView;
    use crate::types::CompletionStatus;
    use async_trait::async_trait;

    struct Code(u16);

    #[async_trait]
    impl Action for Code {
        type Output = ActionResponse;

        fn name(&self) -> &str {
            "code"
        }

        async fn execute(&self) -> Result<ActionResponse, ActionError> {
            Ok(ActionResponse::new(self.0))
        }

        fn cancel(&self) {}
    }

    #[test]
    fn test_required_service_missing() {
        let mut config = TetherConfig::default();
        config.notifications.required = true;
        let result = ActionEngine::new(&config, None);
        assert!(matches!(result, Err(EngineError::MissingNotificationService)));
    }

    #[test]
    fn test_required_service_supplied() {
        let mut config = TetherConfig::default();
        config.notifications.required = true;
        let engine = ActionEngine::new(&config, Some(Arc::new(NoopNotifications))).unwrap();
        assert_eq!(engine.queue().name(), "tether.actions");
    }

    #[test]
    fn test_optional_service_defaults() {
        let mut config = TetherConfig::default();
        config.notifications.log_transitions = false;
        assert!(ActionEngine::new(&config, None).is_ok());
    }

    #[tokio::test]
    async fn test_status_coded_uses_configured_sentinel() {
        let mut config = TetherConfig::default();
        config.actions.success_status_code = 204;
        let recorder = Arc::new(RecordingNotifications::new());
        let engine = ActionEngine::new(&config, Some(recorder.clone())).unwrap();

        let no_content = engine.schedule_status_coded(Code(204), None).unwrap();
        let ok = engine.schedule_status_coded(Code(200), None).unwrap();
        let plain = engine.schedule(Code(500), None).unwrap();
        engine.shutdown().await;

        assert_eq!(no_content.completion_status(), CompletionStatus::Successful);
        assert_eq!(ok.completion_status(), CompletionStatus::Failed);
        assert_eq!(plain.completion_status(), CompletionStatus::Successful);
        assert_eq!(recorder.len(), 6);
    }

    #[tokio::test]
    async fn test_schedule_after_shutdown_is_rejected() {
        let engine = ActionEngine::new(&TetherConfig::default(), None).unwrap();
        engine.shutdown().await;
        let result = engine.schedule(Code(200), None);
        assert!(matches!(result, Err(EngineError::QueueClosed)));
    }
}
