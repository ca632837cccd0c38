//! Action execution engine for Tether.
//!
//! Wraps host-supplied actions in proxies that drive a uniform lifecycle
//! (`created -> executing -> finished`), capture execution statistics,
//! report every transition to a notification service, and fire a single
//! completion callback. Proxies are handed to a concurrent run queue.

pub mod action;
pub mod engine;
pub mod error;
pub mod mapping;
pub mod notification;
pub mod proxy;
pub mod queue;
pub mod statistics;
pub mod types;

pub use action::{Action, CancelSignal};
pub use engine::ActionEngine;
pub use error::{ActionError, EngineError};
pub use mapping::{AcceptAll, ActionResponse, ResultMapping, StatusCodeMapping, StatusCoded};
pub use notification::{
    FanoutNotifications, LoggingNotifications, NoopNotifications, NotificationService,
    RecordingNotifications, StateChange,
};
pub use proxy::{on_completion, ActionProxy, CompletionCallback, ProxyView, Runnable};
pub use queue::ActionQueue;
pub use statistics::Statistics;
pub use types::{ActionState, CompletionStatus};
