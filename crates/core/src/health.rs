//! Component health snapshots.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Coarse health state of a long-running component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthType {
    /// No health has been reported yet.
    #[default]
    Unknown,
    Healthy,
    Unhealthy,
    /// The component is shutting down.
    Exiting,
}

impl fmt::Display for HealthType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HealthType::Unknown => "unknown",
            HealthType::Healthy => "healthy",
            HealthType::Unhealthy => "unhealthy",
            HealthType::Exiting => "exiting",
        };
        f.write_str(s)
    }
}

/// A point-in-time health report: status, human-readable message and when it was set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Health {
    pub health: HealthType,
    pub message: String,
    pub update_time: DateTime<Utc>,
}

impl Health {
    pub fn new(health: HealthType, message: impl Into<String>) -> Self {
        Self {
            health,
            message: message.into(),
            update_time: Utc::now(),
        }
    }

    pub fn healthy(message: impl Into<String>) -> Self {
        Self::new(HealthType::Healthy, message)
    }

    pub fn unhealthy(message: impl Into<String>) -> Self {
        Self::new(HealthType::Unhealthy, message)
    }

    pub fn exiting(message: impl Into<String>) -> Self {
        Self::new(HealthType::Exiting, message)
    }

    pub fn is_healthy(&self) -> bool {
        self.health == HealthType::Healthy
    }
}

impl Default for Health {
    fn default() -> Self {
        Self::new(HealthType::Unknown, "")
    }
}
