//! Codec and scheduler configuration types
//!
//! This module defines the small amount of configuration the library needs:
//! how encoding treats out-of-range values, and how the transmission scheduler
//! queues frames for the bus.

use serde::{Deserialize, Serialize};

/// What encoding does with a value that does not fit its signal
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RangePolicy {
    /// Reject the value with `EncodeError::OutOfRange`
    #[default]
    Fail,
    /// Saturate to the physical bound, then to the field's raw range
    Clamp,
}

/// Configuration for the transmission scheduler
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Frames the dispatch queue holds before timers start dropping ticks
    #[serde(default = "default_queue_depth")]
    pub dispatch_queue_depth: usize,

    /// Range policy applied when timers encode their frames
    #[serde(default)]
    pub range_policy: RangePolicy,

    /// Optional: only schedule these periodic message IDs
    #[serde(default)]
    pub message_filter: Option<Vec<u32>>,
}

fn default_queue_depth() -> usize {
    16
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            dispatch_queue_depth: default_queue_depth(),
            range_policy: RangePolicy::default(),
            message_filter: None,
        }
    }
}

impl SchedulerConfig {
    /// Create a new scheduler configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: set the dispatch queue depth (at least 1)
    pub fn with_queue_depth(mut self, depth: usize) -> Self {
        self.dispatch_queue_depth = depth.max(1);
        self
    }

    /// Builder method: set the range policy
    pub fn with_range_policy(mut self, policy: RangePolicy) -> Self {
        self.range_policy = policy;
        self
    }

    /// Builder method: set message filter
    pub fn with_message_filter(mut self, messages: Vec<u32>) -> Self {
        self.message_filter = Some(messages);
        self
    }

    /// Check if a message ID should be scheduled
    pub fn should_schedule(&self, can_id: u32) -> bool {
        match &self.message_filter {
            Some(messages) => messages.contains(&can_id),
            None => true,
        }
    }
}
