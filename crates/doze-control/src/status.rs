//! Instance lifecycle status model.
//!
//! The provider reports lifecycle as a free-form uppercase string. This
//! module folds it into the four categories the orchestration acts on;
//! anything unrecognized is [`InstanceState::Unknown`], which no
//! operation treats as actionable.

use serde::{Deserialize, Serialize};

/// Category an instance status falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceState {
    Running,
    Starting,
    Stopping,
    Inactive,
    Unknown,
}

/// One status observation: the provider's raw string plus its category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceStatus {
    /// Status string exactly as the provider reported it.
    pub raw: String,
    /// Category the raw value maps to.
    pub state: InstanceState,
}

impl InstanceStatus {
    /// Categorize a raw provider status.
    ///
    /// Total and case-insensitive; unrecognized values (including the
    /// provider's error states) map to `Unknown`.
    pub fn parse(raw: &str) -> Self {
        let state = match raw.to_ascii_uppercase().as_str() {
            "ACTIVE" => InstanceState::Running,
            "BUILD" | "BUILDING" | "UNSHELVING" | "REBOOT" | "HARD_REBOOT" => {
                InstanceState::Starting
            }
            "SHELVING" | "DELETING" | "STOPPING" => InstanceState::Stopping,
            "SHELVED" | "SHELVED_OFFLOADED" | "STOPPED" | "SUSPENDED" | "PAUSED" | "DELETED" => {
                InstanceState::Inactive
            }
            _ => InstanceState::Unknown,
        };
        Self {
            raw: raw.to_string(),
            state,
        }
    }

    pub fn is_running(&self) -> bool {
        self.state == InstanceState::Running
    }

    pub fn is_starting(&self) -> bool {
        self.state == InstanceState::Starting
    }

    pub fn is_stopping(&self) -> bool {
        self.state == InstanceState::Stopping
    }

    pub fn is_inactive(&self) -> bool {
        self.state == InstanceState::Inactive
    }

    /// Starting or stopping: a transition the operations must wait out.
    pub fn is_transitioning(&self) -> bool {
        self.is_starting() || self.is_stopping()
    }
}
