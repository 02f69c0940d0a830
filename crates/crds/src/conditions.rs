//! Status conditions shared by all Strand CRDs
//!
//! Conditions follow the Kubernetes API conventions: one entry per condition
//! type, with `lastTransitionTime` only moving when the status value flips.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Condition status value "True"
pub const CONDITION_TRUE: &str = "True";
/// Condition status value "False"
pub const CONDITION_FALSE: &str = "False";

/// Overall readiness condition used by most kinds
pub const CONDITION_READY: &str = "Ready";
/// Set by the stream reconciler once the row and topic exist
pub const CONDITION_STREAM_CREATED: &str = "StreamCreated";
/// Set by the init reconciler after running migrations
pub const CONDITION_MIGRATIONS_COMPLETE: &str = "MigrationsComplete";

/// A single observed aspect of a resource's health.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StatusCondition {
    /// Condition type (e.g. "Ready")
    #[serde(rename = "type")]
    pub type_: String,

    /// "True", "False" or "Unknown"
    pub status: String,

    /// Machine-readable reason in CamelCase
    pub reason: String,

    /// Human-readable message
    #[serde(default)]
    pub message: String,

    /// Last time the status value changed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<DateTime<Utc>>,
}

impl StatusCondition {
    /// Build a condition stamped with the current time.
    pub fn new(type_: &str, status: &str, reason: &str, message: impl Into<String>) -> Self {
        Self {
            type_: type_.to_string(),
            status: status.to_string(),
            reason: reason.to_string(),
            message: message.into(),
            last_transition_time: Some(Utc::now()),
        }
    }

    /// Shorthand for a `True` condition.
    pub fn truthy(type_: &str, reason: &str, message: impl Into<String>) -> Self {
        Self::new(type_, CONDITION_TRUE, reason, message)
    }

    /// Shorthand for a `False` condition.
    pub fn falsy(type_: &str, reason: &str, message: impl Into<String>) -> Self {
        Self::new(type_, CONDITION_FALSE, reason, message)
    }

    /// Whether the condition status is "True".
    pub fn is_true(&self) -> bool {
        self.status == CONDITION_TRUE
    }
}

/// Insert or update a condition, keeping `lastTransitionTime` when the status
/// value is unchanged.
pub fn set_condition(conditions: &mut Vec<StatusCondition>, new: StatusCondition) {
    match conditions.iter_mut().find(|c| c.type_ == new.type_) {
        Some(existing) if existing.status == new.status => {
            existing.reason = new.reason;
            existing.message = new.message;
        }
        Some(existing) => *existing = new,
        None => conditions.push(new),
    }
}

/// Find a condition by type.
pub fn find_condition<'a>(conditions: &'a [StatusCondition], type_: &str) -> Option<&'a StatusCondition> {
    conditions.iter().find(|c| c.type_ == type_)
}
