//! Execution statistics recorded for one action run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Start/finish timestamps of one run, plus an optional opaque block the
/// action reports about its own sub-work.
///
/// Written only by the owning proxy; observers receive copies.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    start_time: Option<DateTime<Utc>>,
    finish_time: Option<DateTime<Utc>>,
    nested: Option<serde_json::Value>,
}

impl Statistics {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn start(&mut self) {
        self.start_time = Some(Utc::now());
    }

    pub(crate) fn stop(&mut self) {
        self.finish_time = Some(Utc::now());
    }

    pub(crate) fn attach_nested(&mut self, nested: serde_json::Value) {
        self.nested = Some(nested);
    }

    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        self.start_time
    }

    pub fn finish_time(&self) -> Option<DateTime<Utc>> {
        self.finish_time
    }

    /// Elapsed time between start and finish.
    ///
    /// Zero if either bound is unset. A wall clock stepping backwards also
    /// yields zero rather than a negative duration.
    pub fn execution_time(&self) -> Duration {
        match (self.start_time, self.finish_time) {
            (Some(start), Some(finish)) => (finish - start).to_std().unwrap_or(Duration::ZERO),
            _ => Duration::ZERO,
        }
    }

    pub fn nested(&self) -> Option<&serde_json::Value> {
        self.nested.as_ref()
    }
}

impl fmt::Display for Statistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{ executionTime: {:.4}",
            self.execution_time().as_secs_f64()
        )?;
        if let Some(nested) = &self.nested {
            write!(f, ", nested: {}", nested)?;
        }
        match self.start_time {
            Some(start) => write!(f, ", startTime: {}", start.to_rfc3339())?,
            None => write!(f, ", startTime: (not started)")?,
        }
        match self.finish_time {
            Some(finish) => write!(f, ", finishTime: {}", finish.to_rfc3339())?,
            None => write!(f, ", finishTime: (not finished)")?,
        }
        write!(f, " }}")
    }
}
