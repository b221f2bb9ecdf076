use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::Value;
use shared::{
    domain::SessionId,
    protocol::{
        ClientSearchPage, InitializeRequest, InitializeResponse, StageResult, StageSnapshot,
        ValidationReport,
    },
};

/// Remote service that owns authoritative stage state and step validation.
#[async_trait]
pub trait WorkflowService: Send + Sync {
    async fn initialize(&self, request: InitializeRequest) -> Result<InitializeResponse>;
    async fn get_state(&self, session_id: &SessionId) -> Result<StageSnapshot>;
    async fn validate(&self, session_id: &SessionId) -> Result<ValidationReport>;
    async fn advance_step(&self, session_id: &SessionId, payload: Value) -> Result<StageSnapshot>;
    async fn complete(&self, session_id: &SessionId) -> Result<StageResult>;
    async fn cancel(&self, session_id: &SessionId) -> Result<()>;
}

#[async_trait]
pub trait ClientDirectory: Send + Sync {
    async fn search_clients(&self, session_id: &SessionId, keyword: &str)
        -> Result<ClientSearchPage>;
}

pub struct UnavailableWorkflowService;

#[async_trait]
impl WorkflowService for UnavailableWorkflowService {
    async fn initialize(&self, request: InitializeRequest) -> Result<InitializeResponse> {
        Err(anyhow!(
            "workflow service unavailable; cannot initialize stage {}",
            request.stage
        ))
    }

    async fn get_state(&self, session_id: &SessionId) -> Result<StageSnapshot> {
        Err(anyhow!(
            "workflow service unavailable; cannot read session {session_id}"
        ))
    }

    async fn validate(&self, session_id: &SessionId) -> Result<ValidationReport> {
        Err(anyhow!(
            "workflow service unavailable; cannot validate session {session_id}"
        ))
    }

    async fn advance_step(
        &self,
        session_id: &SessionId,
        _payload: Value,
    ) -> Result<StageSnapshot> {
        Err(anyhow!(
            "workflow service unavailable; cannot advance session {session_id}"
        ))
    }

    async fn complete(&self, session_id: &SessionId) -> Result<StageResult> {
        Err(anyhow!(
            "workflow service unavailable; cannot complete session {session_id}"
        ))
    }

    async fn cancel(&self, session_id: &SessionId) -> Result<()> {
        Err(anyhow!(
            "workflow service unavailable; cannot cancel session {session_id}"
        ))
    }
}

#[async_trait]
impl ClientDirectory for UnavailableWorkflowService {
    async fn search_clients(
        &self,
        session_id: &SessionId,
        _keyword: &str,
    ) -> Result<ClientSearchPage> {
        Err(anyhow!(
            "workflow service unavailable; cannot search clients for session {session_id}"
        ))
    }
}
