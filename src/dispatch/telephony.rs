use async_trait::async_trait;
use std::sync::Arc;

use crate::models::{ChannelKind, DispatchOutcome, OutcomeStatus};
use crate::platform::{tel_uri, Dialer};

use super::{DispatchChannel, DispatchContext};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

/// Asks the platform to call the emergency number.
///
/// The app never learns whether the call connected, so a present dialer always
/// yields `Attempted`; a platform error is kept in the detail text only.
pub struct TelephonyChannel {
    dialer: Arc<dyn Dialer>,
}

impl TelephonyChannel {
    pub fn new(dialer: Arc<dyn Dialer>) -> Self {
        Self { dialer }
    }
}

#[async_trait]
impl DispatchChannel for TelephonyChannel {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Telephony
    }

    async fn attempt(&self, ctx: &DispatchContext) -> DispatchOutcome {
        let number = &ctx.emergency_number;
        if !self.dialer.is_available() {
            log_warn!("no call capability; user must dial {number} manually");
            return DispatchOutcome::new(
                ChannelKind::Telephony,
                OutcomeStatus::Unsupported,
                format!("calling is not available on this device; dial {number} manually"),
            );
        }

        let detail = match self.dialer.dial(&tel_uri(number)) {
            Ok(()) => format!("call to {number} requested"),
            Err(err) => {
                log_warn!("dial request for session {} reported: {err}", ctx.session_id);
                format!("call to {number} requested; platform reported: {err}")
            }
        };
        log_info!("telephony attempted for session {}", ctx.session_id);

        DispatchOutcome::new(ChannelKind::Telephony, OutcomeStatus::Attempted, detail)
    }
}
