use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::{ClientSummary, SessionId, Stage};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitializeRequest {
    pub stage: Stage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_session_id: Option<SessionId>,
    #[serde(default)]
    pub params: Value,
}

impl InitializeRequest {
    pub fn new(stage: Stage) -> Self {
        Self {
            stage,
            parent_session_id: None,
            params: Value::Null,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitializeResponse {
    pub session_id: SessionId,
}

/// Stage-specific state as held by the workflow service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageSnapshot {
    pub session_id: SessionId,
    pub stage: Stage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_step: Option<String>,
    #[serde(default)]
    pub state: Value,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    pub message: String,
}

impl ValidationIssue {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            field: None,
            message: message.into(),
        }
    }

    pub fn for_field(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: Some(field.into()),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub valid: bool,
    #[serde(default)]
    pub errors: Vec<ValidationIssue>,
}

impl ValidationReport {
    pub fn ok() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
        }
    }

    pub fn invalid(errors: Vec<ValidationIssue>) -> Self {
        Self {
            valid: false,
            errors,
        }
    }

    pub fn single(message: impl Into<String>) -> Self {
        Self::invalid(vec![ValidationIssue::new(message)])
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvanceStepRequest {
    pub payload: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageResult {
    pub session_id: SessionId,
    pub stage: Stage,
    #[serde(default)]
    pub result: Value,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientSearchQuery {
    pub keyword: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientSearchPage {
    pub clients: Vec<ClientSummary>,
    #[serde(default)]
    pub total: u64,
}
