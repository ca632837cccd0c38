//! Action proxy: the unit scheduled onto a run queue.
//!
//! A proxy owns one action together with its state machine, statistics,
//! captured error and completion status. `run` drives the action through
//! `created -> executing -> finished`, reporting each transition to the
//! notification service and finally invoking the completion callback once.
//! `cancel` may be called from any task at any time.

pub mod state_machine;

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::task::JoinError;
use tracing::{debug, error, info, trace};
use uuid::Uuid;

use crate::action::Action;
use crate::error::{ActionError, EngineError};
use crate::mapping::{AcceptAll, ResultMapping};
use crate::notification::NotificationService;
use crate::statistics::Statistics;
use crate::types::{ActionState, CompletionStatus};
use state_machine::validate_transition;

/// Invoked exactly once per proxy, after it reached `finished`.
pub type CompletionCallback = Box<dyn FnOnce(&dyn ProxyView) + Send>;

/// Box a closure as a completion callback.
pub fn on_completion<F>(callback: F) -> CompletionCallback
where
    F: FnOnce(&dyn ProxyView) + Send + 'static,
{
    Box::new(callback)
}

/// Read-only surface of a proxy exposed to observers.
///
/// Values may advance between two reads. Once `Finished` and a terminal
/// completion status are observed they never change again.
pub trait ProxyView: Send + Sync {
    fn id(&self) -> Uuid;
    fn action_name(&self) -> &str;
    fn state(&self) -> ActionState;
    /// `Unknown` until `state()` is `Finished`.
    fn completion_status(&self) -> CompletionStatus;
    fn is_cancel_requested(&self) -> bool;
    fn error(&self) -> Option<Arc<ActionError>>;
    fn statistics(&self) -> Statistics;
}

/// What a run queue needs from a proxy, independent of the action type.
#[async_trait]
pub trait Runnable: ProxyView {
    /// Drive the action through its lifecycle. Must be called once.
    ///
    /// The returned future must be polled to completion. Dropping it while
    /// the action executes (for example under `tokio::time::timeout`)
    /// detaches the action's task and leaves the proxy in `executing`;
    /// use `cancel` to stop an action early instead.
    async fn run(&self) -> Result<(), EngineError>;

    /// Request cooperative cancellation and forward it to the action.
    fn cancel(&self);
}

struct Lifecycle {
    state: ActionState,
    completion_status: CompletionStatus,
    cancel_requested: bool,
    error: Option<Arc<ActionError>>,
    statistics: Statistics,
}

impl Lifecycle {
    fn new() -> Self {
        Self {
            state: ActionState::Created,
            completion_status: CompletionStatus::Unknown,
            cancel_requested: false,
            error: None,
            statistics: Statistics::new(),
        }
    }
}

/// Wraps one action; `M` interprets the action's output.
pub struct ActionProxy<A: Action, M = AcceptAll> {
    id: Uuid,
    action: Arc<A>,
    mapping: M,
    notifications: Arc<dyn NotificationService>,
    completion: Mutex<Option<CompletionCallback>>,
    started: AtomicBool,
    lifecycle: Mutex<Lifecycle>,
}

impl<A: Action> ActionProxy<A> {
    /// Create a proxy that treats every `Ok` result as a success.
    pub fn new(
        action: A,
        notifications: Arc<dyn NotificationService>,
        completion: Option<CompletionCallback>,
    ) -> Self {
        Self::with_mapping(action, AcceptAll, notifications, completion)
    }
}

impl<A, M> ActionProxy<A, M>
where
    A: Action,
    M: ResultMapping<A::Output>,
{
    /// Create a proxy in state `created`. Nothing runs until `run`.
    pub fn with_mapping(
        action: A,
        mapping: M,
        notifications: Arc<dyn NotificationService>,
        completion: Option<CompletionCallback>,
    ) -> Self {
        let proxy = Self {
            id: Uuid::new_v4(),
            action: Arc::new(action),
            mapping,
            notifications,
            completion: Mutex::new(completion),
            started: AtomicBool::new(false),
            lifecycle: Mutex::new(Lifecycle::new()),
        };
        trace!(proxy = %proxy, "Proxy created");
        proxy
    }

    pub fn action(&self) -> &A {
        &self.action
    }

    pub fn mapping(&self) -> &M {
        &self.mapping
    }

    fn lifecycle(&self) -> MutexGuard<'_, Lifecycle> {
        // Lifecycle writes are plain field assignments; a poisoned lock
        // still holds consistent values.
        self.lifecycle.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn enter_executing(&self) -> Result<(), EngineError> {
        {
            let mut lifecycle = self.lifecycle();
            validate_transition(lifecycle.state, ActionState::Executing)?;
            lifecycle.statistics.start();
            lifecycle.state = ActionState::Executing;
        }
        self.notifications
            .action_state_changed(self, ActionState::Executing);
        Ok(())
    }

    fn enter_finished(
        &self,
        status: CompletionStatus,
        error: Option<Arc<ActionError>>,
    ) -> Result<(), EngineError> {
        {
            let mut lifecycle = self.lifecycle();
            validate_transition(lifecycle.state, ActionState::Finished)?;
            lifecycle.statistics.stop();
            lifecycle.error = error;
            // A cancel that landed any time before this write wins.
            lifecycle.completion_status = if lifecycle.cancel_requested {
                CompletionStatus::Canceled
            } else {
                status
            };
            lifecycle.state = ActionState::Finished;
        }
        // The status is final at this point; a faulty observer is only logged.
        let _ = self.guarded("notify", || {
            self.notifications
                .action_state_changed(self, ActionState::Finished)
        });
        Ok(())
    }

    /// Run host or action code on the run task, turning a panic into an
    /// `ActionError` so the proxy can still finish.
    fn guarded<T>(&self, stage: &str, f: impl FnOnce() -> T) -> Result<T, ActionError> {
        panic::catch_unwind(AssertUnwindSafe(f)).map_err(|payload| {
            let message = panic_message(payload);
            error!(proxy = %self, stage, panic = %message, "Panic outside execute");
            ActionError::Panicked(message)
        })
    }

    /// Run `execute` on its own task so a panic becomes an `ActionError`.
    async fn execute_isolated(&self) -> Result<A::Output, ActionError> {
        let action = Arc::clone(&self.action);
        match tokio::spawn(async move { action.execute().await }).await {
            Ok(result) => result,
            Err(join_error) => Err(join_error_to_action_error(join_error)),
        }
    }

    async fn drive(&self) -> Result<(), EngineError> {
        if self.started.swap(true, Ordering::AcqRel) {
            error!(proxy = %self, "Proxy run more than once");
            return Err(EngineError::AlreadyRun(self.id));
        }

        info!(proxy = %self, action = self.action.name(), "Proxy started");
        let (status, error) = match self.guarded("notify", || self.enter_executing()) {
            Ok(entered) => {
                entered?;
                self.execute_and_map().await
            }
            // An observer rejected the executing transition; the action is
            // not started.
            Err(e) => (CompletionStatus::Failed, Some(Arc::new(e))),
        };

        self.enter_finished(status, error)?;
        self.log_finished();

        let callback = self
            .completion
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .take();
        if let Some(callback) = callback {
            let _ = self.guarded("completion", || callback(self));
        }
        Ok(())
    }

    async fn execute_and_map(&self) -> (CompletionStatus, Option<Arc<ActionError>>) {
        if self.is_cancel_requested() {
            debug!(proxy = %self, "Canceled before execution, action skipped");
            return (CompletionStatus::Canceled, None);
        }

        let result = self.execute_isolated().await;
        let mapped = self.guarded("map", || {
            if let Some(nested) = self.action.statistics() {
                self.lifecycle().statistics.attach_nested(nested);
            }

            // Cancellation is checked before the mapping sees the output.
            let canceled = self.is_cancel_requested();
            match result {
                Ok(_) if canceled => (CompletionStatus::Canceled, None),
                Ok(output) if self.mapping.is_successful(&output) => {
                    (CompletionStatus::Successful, None)
                }
                Ok(_) => (CompletionStatus::Failed, None),
                Err(e) if canceled => (CompletionStatus::Canceled, Some(Arc::new(e))),
                Err(e) => (CompletionStatus::Failed, Some(Arc::new(e))),
            }
        });
        mapped.unwrap_or_else(|e| (CompletionStatus::Failed, Some(Arc::new(e))))
    }

    fn request_cancel(&self) {
        let state = {
            let mut lifecycle = self.lifecycle();
            if !lifecycle.state.is_terminal() {
                lifecycle.cancel_requested = true;
            }
            lifecycle.state
        };
        debug!(proxy = %self, state = %state, "Cancel requested");

        // The flag is set before the action hears about it, so an action
        // that returns early on cancel is always recorded as canceled.
        self.action.cancel();
    }

    fn log_finished(&self) {
        let lifecycle = self.lifecycle();
        match (&lifecycle.completion_status, &lifecycle.error) {
            (CompletionStatus::Failed, Some(error)) => info!(
                proxy = %self,
                status = %lifecycle.completion_status,
                error = %error,
                "Proxy finished"
            ),
            _ => info!(
                proxy = %self,
                status = %lifecycle.completion_status,
                statistics = %lifecycle.statistics,
                "Proxy finished"
            ),
        }
    }
}

fn join_error_to_action_error(join_error: JoinError) -> ActionError {
    if join_error.is_cancelled() {
        return ActionError::Interrupted;
    }
    match join_error.try_into_panic() {
        Ok(payload) => ActionError::Panicked(panic_message(payload)),
        Err(other) => ActionError::Failed(other.to_string()),
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

impl<A, M> ProxyView for ActionProxy<A, M>
where
    A: Action,
    M: ResultMapping<A::Output>,
{
    fn id(&self) -> Uuid {
        self.id
    }

    fn action_name(&self) -> &str {
        self.action.name()
    }

    fn state(&self) -> ActionState {
        self.lifecycle().state
    }

    fn completion_status(&self) -> CompletionStatus {
        self.lifecycle().completion_status
    }

    fn is_cancel_requested(&self) -> bool {
        self.lifecycle().cancel_requested
    }

    fn error(&self) -> Option<Arc<ActionError>> {
        self.lifecycle().error.clone()
    }

    fn statistics(&self) -> Statistics {
        self.lifecycle().statistics.clone()
    }
}

#[async_trait]
impl<A, M> Runnable for ActionProxy<A, M>
where
    A: Action,
    M: ResultMapping<A::Output>,
{
    async fn run(&self) -> Result<(), EngineError> {
        self.drive().await
    }

    fn cancel(&self) {
        self.request_cancel();
    }
}

impl<A: Action, M> fmt::Display for ActionProxy<A, M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<ActionProxy: {} {}>", self.action.name(), self.id)
    }
}

impl<A: Action, M> fmt::Debug for ActionProxy<A, M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lifecycle = self.lifecycle.lock().unwrap_or_else(|p| p.into_inner());
        f.debug_struct("ActionProxy")
            .field("id", &self.id)
            .field("action", &self.action.name())
            .field("state", &lifecycle.state)
            .field("completion_status", &lifecycle.completion_status)
            .field("cancel_requested", &lifecycle.cancel_requested)
            .finish()
    }
}
