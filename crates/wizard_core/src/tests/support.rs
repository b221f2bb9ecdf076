use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};
use shared::{
    domain::{ClientId, ClientSummary, SessionId, Stage},
    error::{ApiException, ErrorCode},
    protocol::{
        ClientSearchPage, InitializeRequest, InitializeResponse, StageResult, StageSnapshot,
        ValidationReport,
    },
};
use tokio::sync::Mutex;

use crate::workflow::{ClientDirectory, WorkflowService};

pub(crate) struct FakeWorkflow {
    pub initialize_calls: AtomicUsize,
    pub initialize_requests: Mutex<Vec<InitializeRequest>>,
    pub search_calls: Mutex<Vec<String>>,
    pub cancelled: Mutex<Vec<SessionId>>,
    pub submitted: Mutex<Vec<(SessionId, Value)>>,
    pub completed: Mutex<Vec<SessionId>>,
    sessions: Mutex<HashMap<SessionId, Stage>>,
    validation: Mutex<HashMap<Stage, ValidationReport>>,
    initialize_delay: Duration,
    initialize_failures: AtomicUsize,
    fail_cancel: bool,
    next_session: AtomicUsize,
}

impl FakeWorkflow {
    pub fn new() -> Self {
        Self {
            initialize_calls: AtomicUsize::new(0),
            initialize_requests: Mutex::new(Vec::new()),
            search_calls: Mutex::new(Vec::new()),
            cancelled: Mutex::new(Vec::new()),
            submitted: Mutex::new(Vec::new()),
            completed: Mutex::new(Vec::new()),
            sessions: Mutex::new(HashMap::new()),
            validation: Mutex::new(HashMap::new()),
            initialize_delay: Duration::ZERO,
            initialize_failures: AtomicUsize::new(0),
            fail_cancel: false,
            next_session: AtomicUsize::new(1),
        }
    }

    pub fn with_initialize_delay(mut self, delay: Duration) -> Self {
        self.initialize_delay = delay;
        self
    }

    /// The next `count` initialize calls are rejected.
    pub fn with_initialize_failures(self, count: usize) -> Self {
        self.initialize_failures.store(count, Ordering::SeqCst);
        self
    }

    pub fn with_failing_cancel(mut self) -> Self {
        self.fail_cancel = true;
        self
    }

    pub fn into_arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn initialize_count(&self) -> usize {
        self.initialize_calls.load(Ordering::SeqCst)
    }

    pub async fn set_validation(&self, stage: Stage, report: ValidationReport) {
        self.validation.lock().await.insert(stage, report);
    }

    pub async fn cancelled_sessions(&self) -> Vec<SessionId> {
        self.cancelled.lock().await.clone()
    }

    pub async fn submitted_payloads(&self) -> Vec<(SessionId, Value)> {
        self.submitted.lock().await.clone()
    }

    async fn stage_of(&self, session_id: &SessionId) -> Result<Stage> {
        self.sessions
            .lock()
            .await
            .get(session_id)
            .copied()
            .ok_or_else(|| ApiException::new(ErrorCode::NotFound, format!("unknown session {session_id}")).into())
    }

    fn snapshot(session_id: &SessionId, stage: Stage, state: Value) -> StageSnapshot {
        StageSnapshot {
            session_id: session_id.clone(),
            stage,
            current_step: None,
            state,
            updated_at: Utc::now(),
        }
    }
}

pub(crate) fn client(id: &str, full_name: &str) -> ClientSummary {
    ClientSummary {
        client_id: ClientId::new(id),
        full_name: full_name.to_string(),
        phone: "+380501112233".to_string(),
        email: None,
    }
}

#[async_trait]
impl WorkflowService for FakeWorkflow {
    async fn initialize(&self, request: InitializeRequest) -> Result<InitializeResponse> {
        self.initialize_calls.fetch_add(1, Ordering::SeqCst);
        self.initialize_requests.lock().await.push(request.clone());
        if !self.initialize_delay.is_zero() {
            tokio::time::sleep(self.initialize_delay).await;
        }

        let should_fail = self
            .initialize_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if should_fail {
            return Err(anyhow!("workflow backend unavailable"));
        }

        let n = self.next_session.fetch_add(1, Ordering::SeqCst);
        let session_id = SessionId::new(format!("{}-{n}", request.stage));
        self.sessions
            .lock()
            .await
            .insert(session_id.clone(), request.stage);
        Ok(InitializeResponse { session_id })
    }

    async fn get_state(&self, session_id: &SessionId) -> Result<StageSnapshot> {
        let stage = self.stage_of(session_id).await?;
        Ok(Self::snapshot(session_id, stage, json!({})))
    }

    async fn validate(&self, session_id: &SessionId) -> Result<ValidationReport> {
        let stage = self.stage_of(session_id).await?;
        Ok(self
            .validation
            .lock()
            .await
            .get(&stage)
            .cloned()
            .unwrap_or_else(ValidationReport::ok))
    }

    async fn advance_step(&self, session_id: &SessionId, payload: Value) -> Result<StageSnapshot> {
        let stage = self.stage_of(session_id).await?;
        self.submitted
            .lock()
            .await
            .push((session_id.clone(), payload.clone()));
        Ok(Self::snapshot(session_id, stage, payload))
    }

    async fn complete(&self, session_id: &SessionId) -> Result<StageResult> {
        let stage = self.stage_of(session_id).await?;
        self.completed.lock().await.push(session_id.clone());

        let result = match stage {
            Stage::ClientCreation => {
                let submitted = self.submitted.lock().await;
                let name = submitted
                    .iter()
                    .rev()
                    .find(|(id, _)| id == session_id)
                    .and_then(|(_, payload)| payload.get("first_name").and_then(Value::as_str))
                    .unwrap_or("Unnamed")
                    .to_string();
                serde_json::to_value(client("client-created", &name))?
            }
            _ => json!({ "order_id": "order-1" }),
        };

        Ok(StageResult {
            session_id: session_id.clone(),
            stage,
            result,
            completed_at: Utc::now(),
        })
    }

    async fn cancel(&self, session_id: &SessionId) -> Result<()> {
        self.cancelled.lock().await.push(session_id.clone());
        if self.fail_cancel {
            return Err(anyhow!("cancel endpoint unreachable"));
        }
        Ok(())
    }
}

#[async_trait]
impl ClientDirectory for FakeWorkflow {
    async fn search_clients(
        &self,
        _session_id: &SessionId,
        keyword: &str,
    ) -> Result<ClientSearchPage> {
        self.search_calls.lock().await.push(keyword.to_string());
        let clients = vec![client("client-1", &format!("{keyword} Shevchenko"))];
        Ok(ClientSearchPage { total: 1, clients })
    }
}
