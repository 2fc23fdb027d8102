//! Activity Tracker Types

use serde::{Deserialize, Serialize};
use std::fmt;

/// One observed user action. Only its effect on the counters is stored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Action {
    #[serde(rename = "userID", default)]
    pub user_id: String,
    #[serde(rename = "actionType", default)]
    pub action_type: String,
    /// Unix seconds. Absent or non-positive means "now".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
}

impl Action {
    pub fn new(user_id: impl Into<String>, action_type: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            action_type: action_type.into(),
            timestamp: None,
        }
    }

    pub fn at(mut self, unix_secs: i64) -> Self {
        self.timestamp = Some(unix_secs);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityStatus {
    Active,
    Inactive,
}

impl ActivityStatus {
    /// `Active` only when `total` is strictly above `threshold`.
    pub fn from_total(total: i64, threshold: i64) -> Self {
        if total > threshold {
            Self::Active
        } else {
            Self::Inactive
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
        }
    }
}

impl fmt::Display for ActivityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a status evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReport {
    pub status: ActivityStatus,
    pub total: i64,
}
