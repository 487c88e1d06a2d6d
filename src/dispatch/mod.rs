pub mod backend_log;
pub mod fake_call;
pub mod location_share;
pub mod telephony;

pub use backend_log::{BackendLogChannel, EmergencyEventRecord};
pub use fake_call::{FakeCall, FakeCallAction};
pub use location_share::{share_message, LocationShareChannel};
pub use telephony::TelephonyChannel;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::error::ChannelError;
use crate::models::{ChannelKind, DispatchOutcome, EmergencyContact, LocationReading, OutcomeStatus};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_info, log_warn};

/// Everything a channel may use, frozen at the instant of dispatch.
#[derive(Debug, Clone)]
pub struct DispatchContext {
    pub session_id: String,
    pub triggered_at: DateTime<Utc>,
    pub location: Option<LocationReading>,
    pub user_id: Option<String>,
    pub emergency_number: String,
    pub contacts: Vec<EmergencyContact>,
    /// Human-readable help message, with a map link when a fix exists.
    pub share_text: String,
}

/// One best-effort emergency side effect. `attempt` never fails: every error
/// is folded into the returned outcome.
#[async_trait]
pub trait DispatchChannel: Send + Sync {
    fn kind(&self) -> ChannelKind;

    async fn attempt(&self, ctx: &DispatchContext) -> DispatchOutcome;
}

/// Fires every channel at once and returns without waiting for any of them.
/// `on_outcome` is called once per channel as it settles.
pub fn issue_all<F>(
    channels: &[Arc<dyn DispatchChannel>],
    ctx: Arc<DispatchContext>,
    timeout: Duration,
    on_outcome: F,
) -> Vec<JoinHandle<()>>
where
    F: Fn(DispatchOutcome) + Send + Sync + 'static,
{
    let on_outcome = Arc::new(on_outcome);
    channels
        .iter()
        .map(|channel| {
            let channel = Arc::clone(channel);
            let ctx = Arc::clone(&ctx);
            let on_outcome = Arc::clone(&on_outcome);
            tokio::spawn(async move {
                let outcome = attempt_bounded(channel, ctx, timeout).await;
                // Details may carry the share text and its coordinates: debug only.
                match outcome.status {
                    OutcomeStatus::Failed => log_warn!("{} failed", outcome.channel.as_str()),
                    status => log_info!("{} settled as {:?}", outcome.channel.as_str(), status),
                }
                log_debug!("{} detail: {}", outcome.channel.as_str(), outcome.detail);
                on_outcome(outcome);
            })
        })
        .collect()
}

/// Runs one attempt on its own task so a panic or a stall becomes a
/// `Failed` row instead of a missing one.
async fn attempt_bounded(
    channel: Arc<dyn DispatchChannel>,
    ctx: Arc<DispatchContext>,
    timeout: Duration,
) -> DispatchOutcome {
    let kind = channel.kind();
    let mut attempt = tokio::spawn(async move { channel.attempt(&ctx).await });

    match tokio::time::timeout(timeout, &mut attempt).await {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(join_err)) => {
            log_error!("{} channel crashed: {join_err}", kind.as_str());
            DispatchOutcome::new(kind, OutcomeStatus::Failed, "channel crashed")
        }
        Err(_) => {
            attempt.abort();
            let err = ChannelError::Timeout(timeout.as_millis() as u64);
            DispatchOutcome::new(kind, OutcomeStatus::Failed, err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ChannelError;
    use crate::test_support::{
        capture_logs, context, fix, FakeShareSheet, PanickingChannel, RecordingChannel,
        StallingChannel,
    };
    use log::Level;
    use std::sync::Mutex;

    #[tokio::test(start_paused = true)]
    async fn slow_and_crashing_channels_still_produce_rows() {
        let channels: Vec<Arc<dyn DispatchChannel>> = vec![
            Arc::new(RecordingChannel::new(ChannelKind::Telephony, OutcomeStatus::Attempted)),
            Arc::new(StallingChannel::new(ChannelKind::BackendLog)),
            Arc::new(PanickingChannel::new(ChannelKind::LocationShare)),
        ];
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);

        let handles = issue_all(
            &channels,
            Arc::new(context(None)),
            Duration::from_secs(2),
            move |outcome| sink.lock().unwrap().push(outcome),
        );
        for handle in handles {
            handle.await.unwrap();
        }

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 3);
        let status = |kind| seen.iter().find(|o| o.channel == kind).map(|o| o.status);
        assert_eq!(status(ChannelKind::Telephony), Some(OutcomeStatus::Attempted));
        assert_eq!(status(ChannelKind::BackendLog), Some(OutcomeStatus::Failed));
        assert_eq!(status(ChannelKind::LocationShare), Some(OutcomeStatus::Failed));
        let timeout_row = seen
            .iter()
            .find(|o| o.channel == ChannelKind::BackendLog)
            .unwrap();
        assert!(timeout_row.detail.contains("timed out"));
    }

    #[tokio::test(start_paused = true)]
    async fn issuing_does_not_wait_for_channels() {
        let stalling = Arc::new(StallingChannel::new(ChannelKind::BackendLog));
        let channels: Vec<Arc<dyn DispatchChannel>> = vec![stalling.clone()];

        let handles = issue_all(
            &channels,
            Arc::new(context(None)),
            Duration::from_secs(60),
            |_| {},
        );
        tokio::task::yield_now().await;
        assert_eq!(handles.len(), 1);
        assert!(!handles[0].is_finished());
        assert_eq!(stalling.calls(), 1);
    }

    #[tokio::test]
    async fn failed_share_keeps_coordinates_out_of_visible_logs() {
        let logs = capture_logs();
        let sheet = Arc::new(FakeShareSheet::new(Err(ChannelError::Platform(
            "dismissed".into(),
        ))));
        let channels: Vec<Arc<dyn DispatchChannel>> = vec![Arc::new(LocationShareChannel::new(sheet))];
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);

        let handles = issue_all(
            &channels,
            Arc::new(context(Some(fix(48.8584, 2.2945)))),
            Duration::from_secs(5),
            move |outcome| sink.lock().unwrap().push(outcome),
        );
        for handle in handles {
            handle.await.unwrap();
        }

        let outcome = seen.lock().unwrap()[0].clone();
        assert_eq!(outcome.status, OutcomeStatus::Failed);
        assert!(outcome.detail.contains("48.858400,2.294500"));

        let leaked: Vec<String> = logs
            .lines_at_or_above(Level::Info)
            .into_iter()
            .filter(|line| line.contains("48.8584"))
            .collect();
        assert!(leaked.is_empty(), "coordinates logged above debug: {leaked:?}");
        assert!(logs
            .lines_at_or_above(Level::Debug)
            .iter()
            .any(|line| line.contains("48.858400,2.294500")));
    }
}
