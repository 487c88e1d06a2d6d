use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Number of one-second ticks between `arm()` and dispatch.
pub const ARM_WINDOW_TICKS: u32 = 5;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", tag = "phase")]
pub enum SosPhase {
    Idle,
    Arming { remaining: u32 },
    Dispatching,
    Active,
    /// Transient: emitted once on cancellation, then the session resets to `Idle`.
    Cancelled,
}

impl Default for SosPhase {
    fn default() -> Self {
        SosPhase::Idle
    }
}

impl SosPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            SosPhase::Idle => "Idle",
            SosPhase::Arming { .. } => "Arming",
            SosPhase::Dispatching => "Dispatching",
            SosPhase::Active => "Active",
            SosPhase::Cancelled => "Cancelled",
        }
    }

    pub fn remaining(&self) -> Option<u32> {
        match self {
            SosPhase::Arming { remaining } => Some(*remaining),
            _ => None,
        }
    }

    pub fn is_arming(&self) -> bool {
        matches!(self, SosPhase::Arming { .. })
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum ChannelKind {
    Telephony,
    LocationShare,
    BackendLog,
}

impl ChannelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelKind::Telephony => "telephony",
            ChannelKind::LocationShare => "locationShare",
            ChannelKind::BackendLog => "backendLog",
        }
    }
}

/// Outcome tag for one channel. Telephony can never confirm delivery, so it
/// stops at `Attempted`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum OutcomeStatus {
    Attempted,
    Succeeded,
    Failed,
    Unsupported,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DispatchOutcome {
    pub channel: ChannelKind,
    pub status: OutcomeStatus,
    pub detail: String,
}

impl DispatchOutcome {
    pub fn new(channel: ChannelKind, status: OutcomeStatus, detail: impl Into<String>) -> Self {
        Self {
            channel,
            status,
            detail: detail.into(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SosSession {
    pub id: Option<String>,
    pub phase: SosPhase,
    pub armed_at: Option<DateTime<Utc>>,
    pub dispatched_at: Option<DateTime<Utc>>,
    /// Channels fired for this session, in issue order. Entries without a
    /// matching row in `dispatch_result` are still pending.
    pub issued_channels: Vec<ChannelKind>,
    pub dispatch_result: Vec<DispatchOutcome>,
    /// Copyable location message, kept so the user can paste it manually.
    pub share_text: Option<String>,
}

impl SosSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&mut self, session_id: String, armed_at: DateTime<Utc>) {
        *self = Self {
            id: Some(session_id),
            phase: SosPhase::Arming {
                remaining: ARM_WINDOW_TICKS,
            },
            armed_at: Some(armed_at),
            ..Self::default()
        };
    }

    pub fn is_current(&self, session_id: &str) -> bool {
        self.id.as_deref() == Some(session_id)
    }

    pub fn outcome_for(&self, channel: ChannelKind) -> Option<&DispatchOutcome> {
        self.dispatch_result.iter().find(|o| o.channel == channel)
    }

    /// Records a channel outcome once; later rows for the same channel are dropped.
    pub fn record(&mut self, outcome: DispatchOutcome) -> bool {
        if self.outcome_for(outcome.channel).is_some() {
            return false;
        }
        self.dispatch_result.push(outcome);
        true
    }

    pub fn pending_channels(&self) -> Vec<ChannelKind> {
        self.issued_channels
            .iter()
            .copied()
            .filter(|kind| self.outcome_for(*kind).is_none())
            .collect()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn begin_starts_full_window() {
        let mut session = SosSession::new();
        session.begin("s-1".into(), Utc::now());
        assert_eq!(session.phase, SosPhase::Arming { remaining: ARM_WINDOW_TICKS });
        assert!(session.is_current("s-1"));
        assert!(session.dispatch_result.is_empty());
    }

    #[test]
    fn outcomes_are_immutable_once_recorded() {
        let mut session = SosSession::new();
        session.issued_channels = vec![ChannelKind::Telephony, ChannelKind::BackendLog];
        assert!(session.record(DispatchOutcome::new(
            ChannelKind::Telephony,
            OutcomeStatus::Attempted,
            "dialing"
        )));
        assert!(!session.record(DispatchOutcome::new(
            ChannelKind::Telephony,
            OutcomeStatus::Failed,
            "late duplicate"
        )));
        assert_eq!(
            session.outcome_for(ChannelKind::Telephony).map(|o| o.status),
            Some(OutcomeStatus::Attempted)
        );
        assert_eq!(session.pending_channels(), vec![ChannelKind::BackendLog]);
    }

    #[test]
    fn phase_serializes_with_remaining() {
        let json = serde_json::to_value(SosPhase::Arming { remaining: 3 }).unwrap();
        assert_eq!(json["phase"], "arming");
        assert_eq!(json["remaining"], 3);
    }
}
