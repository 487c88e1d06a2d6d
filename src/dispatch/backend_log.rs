use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

use crate::error::ChannelError;
use crate::models::{ChannelKind, DispatchOutcome, LocationReading, OutcomeStatus};
use crate::settings::BackendLogSettings;

use super::{DispatchChannel, DispatchContext};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

/// Body posted to the remote emergency log.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmergencyEventRecord {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub location: Option<LocationReading>,
    pub timestamp: DateTime<Utc>,
    pub user_id: Option<String>,
    pub session_id: String,
}

impl EmergencyEventRecord {
    pub fn from_context(ctx: &DispatchContext) -> Self {
        Self {
            kind: "SOS",
            location: ctx.location,
            timestamp: ctx.triggered_at,
            user_id: ctx.user_id.clone(),
            session_id: ctx.session_id.clone(),
        }
    }
}

/// Fire-and-forget emergency record. Any failure is recorded and never retried.
pub struct BackendLogChannel {
    client: Client,
    endpoint: Option<String>,
}

impl BackendLogChannel {
    pub fn new(settings: &BackendLogSettings) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_millis(settings.timeout_ms))
            .build()
            .unwrap_or_else(|err| {
                log_warn!("backend log client fell back to defaults: {err}");
                Client::new()
            });

        Self {
            client,
            endpoint: settings.endpoint.clone().filter(|e| !e.trim().is_empty()),
        }
    }

    async fn post(&self, endpoint: &str, record: &EmergencyEventRecord) -> Result<u16, ChannelError> {
        let response = self
            .client
            .post(endpoint)
            .json(record)
            .send()
            .await
            .map_err(|e| ChannelError::TransientNetworkFailure(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            Ok(status.as_u16())
        } else {
            Err(ChannelError::Rejected(status.as_u16()))
        }
    }
}

#[async_trait]
impl DispatchChannel for BackendLogChannel {
    fn kind(&self) -> ChannelKind {
        ChannelKind::BackendLog
    }

    async fn attempt(&self, ctx: &DispatchContext) -> DispatchOutcome {
        let Some(endpoint) = self.endpoint.as_deref() else {
            return DispatchOutcome::new(
                ChannelKind::BackendLog,
                OutcomeStatus::Unsupported,
                "no emergency log endpoint configured",
            );
        };

        let record = EmergencyEventRecord::from_context(ctx);
        match self.post(endpoint, &record).await {
            Ok(status) => {
                log_info!("emergency event logged for session {} ({status})", ctx.session_id);
                DispatchOutcome::new(
                    ChannelKind::BackendLog,
                    OutcomeStatus::Succeeded,
                    format!("logged (HTTP {status})"),
                )
            }
            Err(err) => {
                log_warn!("emergency event log failed for session {}: {err}", ctx.session_id);
                DispatchOutcome::new(ChannelKind::BackendLog, OutcomeStatus::Failed, err.to_string())
            }
        }
    }
}
