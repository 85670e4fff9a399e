//! Call Status Inspector: provider lookups that never fail the caller
//!
//! Every provider error is absorbed here and reported as "unknown status" /
//! "no transfer", which the engine treats as a settled, declined attempt.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use coordination::{CallObservation, CallStatus};
use tracing::{debug, warn};

use crate::provider::{CallDetails, VoiceProvider};

pub const DEFAULT_TRANSFER_TOOL: &str = "transfer_call";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallStatusInfo {
    pub status: CallStatus,
    /// Epoch milliseconds, when the provider reports one.
    pub end_timestamp: Option<i64>,
}

impl CallStatusInfo {
    fn unknown() -> Self {
        Self {
            status: CallStatus::Unknown,
            end_timestamp: None,
        }
    }
}

pub struct CallInspector {
    provider: Arc<dyn VoiceProvider>,
    transfer_tool: String,
}

impl CallInspector {
    pub fn new(provider: Arc<dyn VoiceProvider>) -> Self {
        Self {
            provider,
            transfer_tool: DEFAULT_TRANSFER_TOOL.to_string(),
        }
    }

    pub fn with_transfer_tool(mut self, tool: impl Into<String>) -> Self {
        self.transfer_tool = tool.into();
        self
    }

    async fn fetch(&self, call_id: &str) -> Option<CallDetails> {
        if call_id.trim().is_empty() {
            debug!("empty call id, skipping provider lookup");
            return None;
        }
        match self.provider.get_call(call_id).await {
            Ok(details) => Some(details),
            Err(e) => {
                warn!(call_id, error = %e, "call lookup failed");
                None
            }
        }
    }

    pub async fn get_call_status(&self, call_id: &str) -> CallStatusInfo {
        match self.fetch(call_id).await {
            Some(details) => status_info(&details),
            None => CallStatusInfo::unknown(),
        }
    }

    pub async fn was_transfer_invoked(&self, call_id: &str) -> bool {
        self.fetch(call_id)
            .await
            .is_some_and(|details| details.invoked_tool(&self.transfer_tool))
    }

    /// Status, end time and transfer signal from a single lookup.
    pub async fn observe(&self, call_id: &str) -> CallObservation {
        let Some(details) = self.fetch(call_id).await else {
            return CallObservation::unknown();
        };
        let info = status_info(&details);
        let observation = CallObservation {
            ended_at: info.end_timestamp.and_then(from_millis),
            transfer_invoked: details.invoked_tool(&self.transfer_tool),
            status: info.status,
        };
        debug!(
            call_id,
            status = %observation.status,
            transfer = observation.transfer_invoked,
            "observed call"
        );
        observation
    }
}

fn status_info(details: &CallDetails) -> CallStatusInfo {
    CallStatusInfo {
        status: CallStatus::parse(details.call_status.as_deref().unwrap_or_default()),
        end_timestamp: details.end_timestamp,
    }
}

fn from_millis(ms: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms).single()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{CallRequest, ProviderError, TranscriptEntry};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CannedProvider {
        details: Option<CallDetails>,
        lookups: AtomicUsize,
    }

    #[async_trait]
    impl VoiceProvider for CannedProvider {
        async fn create_call(&self, _: &CallRequest) -> Result<String, ProviderError> {
            Err(ProviderError::MissingCallId)
        }

        async fn get_call(&self, _: &str) -> Result<CallDetails, ProviderError> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            self.details.clone().ok_or(ProviderError::Status {
                status: 500,
                body: "boom".into(),
            })
        }
    }

    fn inspector(details: Option<CallDetails>) -> (CallInspector, Arc<CannedProvider>) {
        let provider = Arc::new(CannedProvider {
            details,
            lookups: AtomicUsize::new(0),
        });
        (CallInspector::new(provider.clone()), provider)
    }

    #[tokio::test]
    async fn test_empty_id_skips_lookup() {
        let (inspector, provider) = inspector(Some(CallDetails::default()));
        assert_eq!(inspector.get_call_status("").await, CallStatusInfo::unknown());
        assert!(!inspector.was_transfer_invoked("  ").await);
        assert_eq!(provider.lookups.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_provider_error_is_absorbed() {
        let (inspector, _) = inspector(None);
        assert_eq!(inspector.get_call_status("c1").await.status, CallStatus::Unknown);
        assert!(!inspector.was_transfer_invoked("c1").await);
        assert_eq!(inspector.observe("c1").await, CallObservation::unknown());
    }

    #[tokio::test]
    async fn test_observe_combines_status_end_and_transfer() {
        let details = CallDetails {
            call_id: Some("c1".into()),
            call_status: Some("ended".into()),
            end_timestamp: Some(1_736_906_400_000),
            transcript_with_tool_calls: Some(vec![TranscriptEntry {
                role: Some("tool_call_invocation".into()),
                name: Some("transfer_call".into()),
            }]),
        };
        let (inspector, provider) = inspector(Some(details));
        let observation = inspector.observe("c1").await;
        assert_eq!(observation.status, CallStatus::Ended);
        assert!(observation.transfer_invoked);
        assert_eq!(
            observation.ended_at,
            Some(Utc.with_ymd_and_hms(2025, 1, 15, 2, 0, 0).unwrap())
        );
        assert_eq!(provider.lookups.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_custom_transfer_tool_name() {
        let details = CallDetails {
            transcript_with_tool_calls: Some(vec![TranscriptEntry {
                role: Some("tool_call_invocation".into()),
                name: Some("warm_transfer".into()),
            }]),
            ..Default::default()
        };
        let (inspector, _) = inspector(Some(details));
        assert!(!inspector.was_transfer_invoked("c1").await);
        let inspector = inspector.with_transfer_tool("warm_transfer");
        assert!(inspector.was_transfer_invoked("c1").await);
    }
}
