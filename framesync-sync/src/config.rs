//! Configuration for sync groups and edit history

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for a [`FrameSync`](crate::FrameSync) group
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Log every propagation pass at `debug` level instead of `trace`
    pub log_passes: bool,
}

impl SyncConfig {
    /// Enable or disable pass logging
    pub fn with_log_passes(mut self, log_passes: bool) -> Self {
        self.log_passes = log_passes;
        self
    }
}

/// Configuration for a [`FrameHistory`](crate::FrameHistory)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Consecutive edits of the same kind to the same frame closer together
    /// than this collapse into one undo step (0 disables merging)
    pub merge_window_secs: f64,
    /// Maximum number of undo steps kept (0 = unbounded)
    pub max_commands: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            merge_window_secs: 0.25,
            max_commands: 0,
        }
    }
}

impl HistoryConfig {
    /// Set the merge window in seconds
    pub fn with_merge_window_secs(mut self, secs: f64) -> Self {
        self.merge_window_secs = secs;
        self
    }

    /// Cap the number of undo steps
    pub fn with_max_commands(mut self, max_commands: usize) -> Self {
        self.max_commands = max_commands;
        self
    }

    /// Merge window as a duration, `None` when merging is disabled
    pub fn merge_window(&self) -> Option<Duration> {
        if self.merge_window_secs > 0.0 && self.merge_window_secs.is_finite() {
            Some(Duration::from_secs_f64(self.merge_window_secs))
        } else {
            None
        }
    }
}
