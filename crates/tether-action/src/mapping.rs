//! Result interpretation for proxies bound to a specific action type.
//!
//! A proxy only knows that `execute` returned `Ok`. A mapping decides
//! whether that output counts as a success. The proxy consults it after its
//! cancellation check, so a canceled run never becomes successful here.

use serde::{Deserialize, Serialize};

/// Maps an action's output to success or failure.
pub trait ResultMapping<O>: Send + Sync + 'static {
    fn is_successful(&self, output: &O) -> bool;
}

/// Every `Ok` output is a success.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AcceptAll;

impl<O> ResultMapping<O> for AcceptAll {
    fn is_successful(&self, _output: &O) -> bool {
        true
    }
}

/// Outputs carrying a numeric status code.
pub trait StatusCoded {
    fn status_code(&self) -> u16;
}

/// Success if and only if the status code equals the `ok` sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusCodeMapping {
    ok: u16,
}

impl StatusCodeMapping {
    pub fn new(ok: u16) -> Self {
        Self { ok }
    }

    pub fn ok_code(&self) -> u16 {
        self.ok
    }
}

impl Default for StatusCodeMapping {
    fn default() -> Self {
        Self::new(200)
    }
}

impl<O: StatusCoded> ResultMapping<O> for StatusCodeMapping {
    fn is_successful(&self, output: &O) -> bool {
        output.status_code() == self.ok
    }
}

/// Stock status-coded output: a code plus optional payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionResponse {
    pub status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl ActionResponse {
    pub fn new(status: u16) -> Self {
        Self { status, data: None }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }
}

impl StatusCoded for ActionResponse {
    fn status_code(&self) -> u16 {
        self.status
    }
}

impl StatusCoded for u16 {
    fn status_code(&self) -> u16 {
        *self
    }
}
