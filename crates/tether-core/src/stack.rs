//! Persistent stack boundary.
//!
//! The engine never talks to storage directly. Actions that persist data
//! acquire a per-unit-of-work context from a `PersistentStack` and may
//! report that context's statistics as their nested statistics block.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// Names the data model a store is opened with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    pub name: String,
    pub version: u32,
}

impl ModelDescriptor {
    pub fn new(name: impl Into<String>, version: u32) -> Self {
        Self {
            name: name.into(),
            version,
        }
    }
}

impl fmt::Display for ModelDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} v{}", self.name, self.version)
    }
}

/// Where a store lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreLocation {
    InMemory,
    Path(PathBuf),
}

impl fmt::Display for StoreLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreLocation::InMemory => write!(f, "memory"),
            StoreLocation::Path(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Contract of a persistence stack: open once, then hand out one context
/// per unit of work.
pub trait PersistentStack: Send + Sync {
    type Context: Send;

    fn open(&self, model: &ModelDescriptor, location: &StoreLocation) -> Result<(), StoreError>;

    fn context(&self) -> Result<Self::Context, StoreError>;
}

/// Change counts accumulated by one context.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextStatistics {
    pub inserted: u64,
    pub updated: u64,
    pub deleted: u64,
}

impl fmt::Display for ContextStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{ inserted: {}, updated: {}, deleted: {} }}",
            self.inserted, self.updated, self.deleted
        )
    }
}

type Records = Arc<Mutex<HashMap<String, serde_json::Value>>>;

fn lock(records: &Records) -> MutexGuard<'_, HashMap<String, serde_json::Value>> {
    // A poisoned map is still structurally valid.
    records.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

struct OpenStore {
    model: ModelDescriptor,
    location: StoreLocation,
    records: Records,
}

/// In-memory persistent stack.
#[derive(Default)]
pub struct MemoryStack {
    store: Mutex<Option<OpenStore>>,
}

impl MemoryStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// The model the stack was opened with, if any.
    pub fn model(&self) -> Option<ModelDescriptor> {
        let store = self.store.lock().unwrap_or_else(|p| p.into_inner());
        store.as_ref().map(|s| s.model.clone())
    }
}

impl PersistentStack for MemoryStack {
    type Context = MemoryContext;

    fn open(&self, model: &ModelDescriptor, location: &StoreLocation) -> Result<(), StoreError> {
        if *location != StoreLocation::InMemory {
            return Err(StoreError::InvalidLocation(location.to_string()));
        }

        let mut store = self.store.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(open) = store.as_ref() {
            if open.model != *model {
                return Err(StoreError::ModelMismatch {
                    expected: open.model.to_string(),
                    found: model.to_string(),
                });
            }
            return Err(StoreError::AlreadyOpen(open.location.to_string()));
        }

        tracing::debug!(model = %model, location = %location, "Store opened");
        *store = Some(OpenStore {
            model: model.clone(),
            location: location.clone(),
            records: Arc::new(Mutex::new(HashMap::new())),
        });
        Ok(())
    }

    fn context(&self) -> Result<MemoryContext, StoreError> {
        let store = self.store.lock().unwrap_or_else(|p| p.into_inner());
        let open = store.as_ref().ok_or(StoreError::NotOpen)?;
        Ok(MemoryContext {
            records: Arc::clone(&open.records),
            statistics: ContextStatistics::default(),
        })
    }
}

/// A unit of work against a `MemoryStack`.
pub struct MemoryContext {
    records: Records,
    statistics: ContextStatistics,
}

impl MemoryContext {
    /// Insert or replace a record.
    pub fn put(&mut self, key: impl Into<String>, value: serde_json::Value) {
        let previous = lock(&self.records).insert(key.into(), value);
        if previous.is_some() {
            self.statistics.updated += 1;
        } else {
            self.statistics.inserted += 1;
        }
    }

    pub fn get(&self, key: &str) -> Option<serde_json::Value> {
        lock(&self.records).get(key).cloned()
    }

    /// Remove a record. Returns whether it existed.
    pub fn delete(&mut self, key: &str) -> bool {
        let removed = lock(&self.records).remove(key).is_some();
        if removed {
            self.statistics.deleted += 1;
        }
        removed
    }

    pub fn statistics(&self) -> ContextStatistics {
        self.statistics
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ledger() -> ModelDescriptor {
        ModelDescriptor::new("ledger", 1)
    }

    #[test]
    fn test_context_before_open_fails() {
        let stack = MemoryStack::new();
        assert_eq!(stack.context().err(), Some(StoreError::NotOpen));
        assert!(stack.model().is_none());
    }

    #[test]
    fn test_open_rejects_path_location() {
        let stack = MemoryStack::new();
        let location = StoreLocation::Path(PathBuf::from("/tmp/ledger.db"));
        let err = stack.open(&ledger(), &location).unwrap_err();
        assert!(matches!(err, StoreError::InvalidLocation(_)));
    }

    #[test]
    fn test_open_twice() {
        let stack = MemoryStack::new();
        stack.open(&ledger(), &StoreLocation::InMemory).unwrap();
        assert_eq!(stack.model(), Some(ledger()));

        let err = stack.open(&ledger(), &StoreLocation::InMemory).unwrap_err();
        assert_eq!(err, StoreError::AlreadyOpen("memory".to_string()));

        let err = stack
            .open(&ModelDescriptor::new("ledger", 2), &StoreLocation::InMemory)
            .unwrap_err();
        assert!(matches!(err, StoreError::ModelMismatch { .. }));
    }

    #[test]
    fn test_context_counts_changes() {
        let stack = MemoryStack::new();
        stack.open(&ledger(), &StoreLocation::InMemory).unwrap();

        let mut ctx = stack.context().unwrap();
        ctx.put("a", json!(1));
        ctx.put("b", json!(2));
        ctx.put("a", json!(3));
        assert!(ctx.delete("b"));
        assert!(!ctx.delete("missing"));

        assert_eq!(
            ctx.statistics(),
            ContextStatistics {
                inserted: 2,
                updated: 1,
                deleted: 1,
            }
        );
        assert_eq!(ctx.get("a"), Some(json!(3)));
    }

    #[test]
    fn test_contexts_share_records_but_not_statistics() {
        let stack = MemoryStack::new();
        stack.open(&ledger(), &StoreLocation::InMemory).unwrap();

        let mut writer = stack.context().unwrap();
        writer.put("k", json!("v"));

        let reader = stack.context().unwrap();
        assert_eq!(reader.get("k"), Some(json!("v")));
        assert_eq!(reader.statistics(), ContextStatistics::default());
    }

    #[test]
    fn test_statistics_display() {
        let stats = ContextStatistics {
            inserted: 4,
            updated: 0,
            deleted: 1,
        };
        assert_eq!(stats.to_string(), "{ inserted: 4, updated: 0, deleted: 1 }");
    }
}
