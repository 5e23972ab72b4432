//! Append-only operation log.
//!
//! Each entry is also emitted through `tracing` under the `reshape` target.

use tracing::{debug, info, warn};

/// Ordered, human-readable record of what a pipeline did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OperationLog {
    entries: Vec<String>,
}

impl OperationLog {
    /// Records a routine pipeline action.
    pub fn record(&mut self, message: impl Into<String>) {
        let message = message.into();
        debug!(target: "reshape", "{}", message);
        self.entries.push(message);
    }

    /// Records a change to the dataset itself (expansion, reset).
    pub fn notice(&mut self, message: impl Into<String>) {
        let message = message.into();
        info!(target: "reshape", "{}", message);
        self.entries.push(message);
    }

    /// Records a rejected configuration call.
    pub fn error(&mut self, message: impl Into<String>) {
        let message = message.into();
        warn!(target: "reshape", "{}", message);
        self.entries.push(message);
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
