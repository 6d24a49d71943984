use std::{fmt::Display, time::Duration};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DiagnosticKind {
    SlowRequest {
        #[serde(rename = "duration")]
        duration_ms: u64,
    },
    NetworkError { error: String },
}

impl DiagnosticKind {
    pub const fn name(&self) -> &'static str {
        match self {
            DiagnosticKind::SlowRequest { .. } => "slow_request",
            DiagnosticKind::NetworkError { .. } => "network_error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticRecord {
    pub url: String,
    #[serde(flatten)]
    pub kind: DiagnosticKind,
    pub timestamp: DateTime<Utc>,
}

impl DiagnosticRecord {
    pub fn slow_request<S: Into<String>>(url: S, duration: Duration) -> Self {
        Self {
            url: url.into(),
            kind: DiagnosticKind::SlowRequest {
                duration_ms: duration.as_millis() as u64,
            },
            timestamp: Utc::now(),
        }
    }

    pub fn network_error<S: Into<String>, E: Display>(url: S, error: E) -> Self {
        Self {
            url: url.into(),
            kind: DiagnosticKind::NetworkError {
                error: error.to_string(),
            },
            timestamp: Utc::now(),
        }
    }
}

/// A record as read back from the store, with its auto-incremented id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredDiagnostic {
    pub id: i64,
    #[serde(flatten)]
    pub record: DiagnosticRecord,
}
