//! Voice-call provider client.
//!
//! `VoiceProvider` is the seam the scheduler talks to; `RetellClient` is the
//! production implementation over the provider's REST API.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::ProviderSettings;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("provider returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("provider response carried no call_id")]
    MissingCallId,
}

/// Values the voice agent interpolates into its script.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CallVariables {
    pub customer_name: String,
    pub customer_address: String,
    pub transcript: String,
    pub call_summary: String,
    pub transfer_number: String,
    pub emergency_type: String,
    pub is_emergency: String,
    pub call_purpose: String,
    pub contact_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manager_name: Option<String>,
}

/// Body of a create-call request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CallRequest {
    pub from_number: String,
    pub to_number: String,
    pub override_agent_id: String,
    pub retell_llm_dynamic_variables: CallVariables,
}

/// One entry of the call transcript, including tool invocations.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TranscriptEntry {
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

/// The subset of a provider call record the scheduler needs.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallDetails {
    #[serde(default)]
    pub call_id: Option<String>,
    #[serde(default)]
    pub call_status: Option<String>,
    /// Epoch milliseconds.
    #[serde(default)]
    pub end_timestamp: Option<i64>,
    #[serde(default)]
    pub transcript_with_tool_calls: Option<Vec<TranscriptEntry>>,
}

impl CallDetails {
    /// Whether the agent invoked the tool named `tool` during the call.
    pub fn invoked_tool(&self, tool: &str) -> bool {
        self.transcript_with_tool_calls
            .iter()
            .flatten()
            .any(|entry| {
                entry.role.as_deref() == Some("tool_call_invocation")
                    && entry.name.as_deref() == Some(tool)
            })
    }
}

#[async_trait]
pub trait VoiceProvider: Send + Sync {
    /// Place an outbound call and return its id.
    async fn create_call(&self, request: &CallRequest) -> Result<String, ProviderError>;

    async fn get_call(&self, call_id: &str) -> Result<CallDetails, ProviderError>;
}

#[derive(Deserialize)]
struct CreatedCall {
    #[serde(default)]
    call_id: Option<String>,
}

/// REST client for the hosted voice-agent platform.
pub struct RetellClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl RetellClient {
    pub fn new(settings: &ProviderSettings) -> Result<Self, ProviderError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_key: settings.api_key.clone(),
        })
    }

    async fn error_for(response: reqwest::Response) -> ProviderError {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        ProviderError::Status { status, body }
    }
}

#[async_trait]
impl VoiceProvider for RetellClient {
    async fn create_call(&self, request: &CallRequest) -> Result<String, ProviderError> {
        let response = self
            .http
            .post(format!("{}/create-phone-call", self.base_url))
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await?;

        // The platform answers 201 Created, older deployments 200.
        if !matches!(response.status().as_u16(), 200 | 201) {
            return Err(Self::error_for(response).await);
        }
        let created: CreatedCall = response.json().await?;
        created
            .call_id
            .filter(|id| !id.is_empty())
            .ok_or(ProviderError::MissingCallId)
    }

    async fn get_call(&self, call_id: &str) -> Result<CallDetails, ProviderError> {
        let response = self
            .http
            .get(format!("{}/get-call/{call_id}", self.base_url))
            .bearer_auth(&self.api_key)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Self::error_for(response).await);
        }
        Ok(response.json().await?)
    }
}
