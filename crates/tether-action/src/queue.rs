//! Concurrent run queue for action proxies.
//!
//! Each submitted proxy is run exactly once on the tokio runtime. A
//! semaphore caps how many run at the same time; proxies waiting for a
//! permit can still be canceled and will then finish without executing.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tether_core::config::QueueConfig;
use tokio::runtime::Handle;
use tokio::sync::{watch, Semaphore};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::EngineError;
use crate::proxy::Runnable;

type Inflight = Arc<Mutex<HashMap<Uuid, Arc<dyn Runnable>>>>;

fn lock(inflight: &Inflight) -> MutexGuard<'_, HashMap<Uuid, Arc<dyn Runnable>>> {
    inflight.lock().unwrap_or_else(|p| p.into_inner())
}

/// Removes a proxy from the in-flight set when its task ends, including
/// when the task unwinds.
struct InflightEntry {
    id: Uuid,
    inflight: Inflight,
    pending: Arc<watch::Sender<usize>>,
}

impl Drop for InflightEntry {
    fn drop(&mut self) {
        let mut inflight = lock(&self.inflight);
        inflight.remove(&self.id);
        self.pending.send_replace(inflight.len());
    }
}

/// Runs proxies concurrently, at most `max_concurrent` at a time.
pub struct ActionQueue {
    name: String,
    permits: Option<Arc<Semaphore>>,
    inflight: Inflight,
    pending: Arc<watch::Sender<usize>>,
    closed: AtomicBool,
}

impl ActionQueue {
    /// Create a queue. `max_concurrent == 0` means unbounded.
    pub fn new(name: impl Into<String>, max_concurrent: usize) -> Self {
        let (pending, _rx) = watch::channel(0);
        Self {
            name: name.into(),
            permits: (max_concurrent > 0).then(|| Arc::new(Semaphore::new(max_concurrent))),
            inflight: Arc::new(Mutex::new(HashMap::new())),
            pending: Arc::new(pending),
            closed: AtomicBool::new(false),
        }
    }

    pub fn from_config(config: &QueueConfig) -> Self {
        Self::new(config.name.clone(), config.max_concurrent)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Proxies submitted and not yet finished.
    pub fn len(&self) -> usize {
        lock(&self.inflight).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Hand a proxy to the queue. It runs as soon as a permit is free.
    ///
    /// Must be called from within a tokio runtime. A proxy that is still
    /// in flight is rejected with `EngineError::AlreadyRun`.
    pub fn submit(&self, proxy: Arc<dyn Runnable>) -> Result<(), EngineError> {
        if self.is_closed() {
            return Err(EngineError::QueueClosed);
        }
        let handle = Handle::try_current().map_err(|_| EngineError::NoRuntime)?;

        let id = proxy.id();
        {
            let mut inflight = lock(&self.inflight);
            if inflight.contains_key(&id) {
                warn!(queue = %self.name, proxy = %id, "Proxy already in flight");
                return Err(EngineError::AlreadyRun(id));
            }
            inflight.insert(id, Arc::clone(&proxy));
            self.pending.send_replace(inflight.len());
        }
        debug!(queue = %self.name, proxy = %id, action = proxy.action_name(), "Proxy submitted");

        let permits = self.permits.clone();
        let entry = InflightEntry {
            id,
            inflight: Arc::clone(&self.inflight),
            pending: Arc::clone(&self.pending),
        };
        let queue = self.name.clone();

        handle.spawn(async move {
            let _entry = entry;
            let _permit = match permits {
                Some(semaphore) => semaphore.acquire_owned().await.ok(),
                None => None,
            };

            if let Err(e) = proxy.run().await {
                error!(queue = %queue, proxy = %id, error = %e, "Proxy run rejected");
            }
        });

        Ok(())
    }

    /// Cancel every proxy that has not finished yet.
    ///
    /// Returns how many proxies were asked to cancel.
    pub fn cancel_all(&self) -> usize {
        let proxies: Vec<Arc<dyn Runnable>> = lock(&self.inflight).values().cloned().collect();
        info!(queue = %self.name, count = proxies.len(), "Canceling all proxies");
        for proxy in &proxies {
            proxy.cancel();
        }
        proxies.len()
    }

    /// Resolve once every submitted proxy has finished.
    pub async fn wait_idle(&self) {
        let mut rx = self.pending.subscribe();
        // The sender is owned by `self`, so the channel cannot close here.
        let _ = rx.wait_for(|pending| *pending == 0).await;
    }

    /// Reject further submissions. Proxies already submitted keep running.
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            info!(queue = %self.name, "Run queue closed");
        }
    }

    /// Close the queue and wait for in-flight proxies to finish.
    pub async fn shutdown(&self) {
        self.close();
        self.wait_idle().await;
    }
}

impl Default for ActionQueue {
    fn default() -> Self {
        Self::from_config(&QueueConfig::default())
    }
}
