use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde_json::Value;
use shared::{
    domain::SessionId,
    error::{ApiError, ApiException},
    protocol::{
        AdvanceStepRequest, ClientSearchPage, InitializeRequest, InitializeResponse, StageResult,
        StageSnapshot, ValidationReport,
    },
};
use tracing::debug;
use url::Url;

use crate::workflow::{ClientDirectory, WorkflowService};

pub struct HttpWorkflowService {
    http: Client,
    base_url: Url,
}

impl HttpWorkflowService {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build workflow http client")?;
        Self::with_client(base_url, http)
    }

    pub fn with_client(base_url: &str, http: Client) -> Result<Self> {
        let mut normalized = base_url.trim().to_string();
        if !normalized.ends_with('/') {
            normalized.push('/');
        }
        let base_url = Url::parse(&normalized)
            .with_context(|| format!("invalid workflow service url '{base_url}'"))?;
        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .with_context(|| format!("invalid workflow endpoint path '{path}'"))
    }

    fn session_endpoint(&self, session_id: &SessionId, suffix: &str) -> Result<Url> {
        let mut url = self.endpoint("workflow/sessions")?;
        url.path_segments_mut()
            .map_err(|_| anyhow!("workflow service url cannot carry path segments"))?
            .push(session_id.as_str());
        if !suffix.is_empty() {
            url.path_segments_mut()
                .map_err(|_| anyhow!("workflow service url cannot carry path segments"))?
                .push(suffix);
        }
        Ok(url)
    }
}

async fn error_from_response(response: Response) -> anyhow::Error {
    let status = response.status();
    let body = match response.bytes().await {
        Ok(body) => body,
        Err(err) => return anyhow!("workflow service returned {status}; body unreadable: {err}"),
    };
    match serde_json::from_slice::<ApiError>(&body) {
        Ok(api_error) => ApiException::from(api_error).into(),
        Err(_) => anyhow!(
            "workflow service returned {status}: {}",
            String::from_utf8_lossy(&body)
        ),
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
    if !response.status().is_success() {
        return Err(error_from_response(response).await);
    }
    response
        .json::<T>()
        .await
        .context("failed to decode workflow service response")
}

#[async_trait]
impl WorkflowService for HttpWorkflowService {
    async fn initialize(&self, request: InitializeRequest) -> Result<InitializeResponse> {
        let url = self.endpoint(&format!(
            "workflow/stages/{}/sessions",
            request.stage.as_str()
        ))?;
        debug!(stage = %request.stage, %url, "transport: initialize");
        let response = self.http.post(url).json(&request).send().await?;
        decode(response).await
    }

    async fn get_state(&self, session_id: &SessionId) -> Result<StageSnapshot> {
        let url = self.session_endpoint(session_id, "state")?;
        let response = self.http.get(url).send().await?;
        decode(response).await
    }

    async fn validate(&self, session_id: &SessionId) -> Result<ValidationReport> {
        let url = self.session_endpoint(session_id, "validation")?;
        let response = self.http.get(url).send().await?;
        decode(response).await
    }

    async fn advance_step(&self, session_id: &SessionId, payload: Value) -> Result<StageSnapshot> {
        let url = self.session_endpoint(session_id, "steps")?;
        let response = self
            .http
            .post(url)
            .json(&AdvanceStepRequest { payload })
            .send()
            .await?;
        decode(response).await
    }

    async fn complete(&self, session_id: &SessionId) -> Result<StageResult> {
        let url = self.session_endpoint(session_id, "complete")?;
        let response = self.http.post(url).send().await?;
        decode(response).await
    }

    async fn cancel(&self, session_id: &SessionId) -> Result<()> {
        let url = self.session_endpoint(session_id, "")?;
        let response = self.http.delete(url).send().await?;
        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }
        Ok(())
    }
}

#[async_trait]
impl ClientDirectory for HttpWorkflowService {
    async fn search_clients(
        &self,
        session_id: &SessionId,
        keyword: &str,
    ) -> Result<ClientSearchPage> {
        let url = self.session_endpoint(session_id, "clients")?;
        let response = self
            .http
            .get(url)
            .query(&[("keyword", keyword)])
            .send()
            .await?;
        decode(response).await
    }
}

#[cfg(test)]
#[path = "tests/transport_tests.rs"]
mod tests;
