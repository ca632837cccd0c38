//! Demo action that writes records through a store context.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tether_action::{Action, ActionError, ActionResponse, CancelSignal};
use tether_core::stack::{ContextStatistics, MemoryStack, PersistentStack};

/// What one ledger action does when executed.
#[derive(Debug, Clone, Copy)]
pub struct Plan {
    pub records: u64,
    pub work: Duration,
    pub fail: bool,
}

/// Writes `plan.records` entries, pausing between them, and answers with
/// status 200 (or 500 when `plan.fail` is set).
pub struct LedgerAction {
    name: String,
    stack: Arc<MemoryStack>,
    plan: Plan,
    signal: CancelSignal,
    context_stats: Mutex<Option<ContextStatistics>>,
}

impl LedgerAction {
    pub fn new(name: impl Into<String>, stack: Arc<MemoryStack>, plan: Plan) -> Self {
        Self {
            name: name.into(),
            stack,
            plan,
            signal: CancelSignal::new(),
            context_stats: Mutex::new(None),
        }
    }
}

#[async_trait]
impl Action for LedgerAction {
    type Output = ActionResponse;

    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self) -> Result<ActionResponse, ActionError> {
        let mut ctx = self.stack.context()?;
        let mut written = 0;

        for record in 0..self.plan.records {
            if self.signal.is_canceled() {
                break;
            }
            ctx.put(
                format!("{}/{}", self.name, record),
                json!({ "action": self.name, "record": record }),
            );
            written += 1;

            tokio::select! {
                _ = self.signal.canceled() => break,
                _ = tokio::time::sleep(self.plan.work) => {}
            }
        }

        *self
            .context_stats
            .lock()
            .unwrap_or_else(|p| p.into_inner()) = Some(ctx.statistics());

        let status = if self.plan.fail { 500 } else { 200 };
        Ok(ActionResponse::new(status).with_data(json!({ "written": written })))
    }

    fn cancel(&self) {
        self.signal.cancel();
    }

    fn statistics(&self) -> Option<serde_json::Value> {
        let stats = *self
            .context_stats
            .lock()
            .unwrap_or_else(|p| p.into_inner());
        stats.and_then(|s| serde_json::to_value(s).ok())
    }
}
