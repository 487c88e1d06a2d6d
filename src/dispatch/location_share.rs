use async_trait::async_trait;
use std::sync::Arc;

use crate::models::{ChannelKind, DispatchOutcome, EmergencyContact, LocationReading, OutcomeStatus};
use crate::platform::ShareSheet;

use super::{DispatchChannel, DispatchContext};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

const SHARE_TITLE: &str = "SOS - I need help";

/// Builds the help message. Without a fix the message says so explicitly
/// rather than dropping the location line.
pub fn share_message(
    location: Option<&LocationReading>,
    map_base_url: &str,
    emergency_number: &str,
    contacts: &[EmergencyContact],
) -> String {
    let mut text = String::from("SOS! I need help.");
    match location {
        Some(fix) => text.push_str(&format!(
            " My location: {}{:.6},{:.6} (as of {} UTC).",
            map_base_url,
            fix.latitude,
            fix.longitude,
            fix.captured_at.format("%H:%M:%S")
        )),
        None => text.push_str(" My location is unavailable."),
    }
    text.push_str(&format!(" Emergency number: {emergency_number}."));
    if !contacts.is_empty() {
        let names: Vec<String> = contacts
            .iter()
            .map(|c| format!("{} ({})", c.name, c.relation))
            .collect();
        text.push_str(&format!(" Please tell: {}.", names.join(", ")));
    }
    text
}

/// Opens the native share sheet with the help message. Whenever that cannot
/// happen, the message is carried in the outcome detail for manual copy.
pub struct LocationShareChannel {
    sheet: Arc<dyn ShareSheet>,
}

impl LocationShareChannel {
    pub fn new(sheet: Arc<dyn ShareSheet>) -> Self {
        Self { sheet }
    }
}

#[async_trait]
impl DispatchChannel for LocationShareChannel {
    fn kind(&self) -> ChannelKind {
        ChannelKind::LocationShare
    }

    async fn attempt(&self, ctx: &DispatchContext) -> DispatchOutcome {
        let text = &ctx.share_text;

        if !self.sheet.is_available() {
            log_warn!("share sheet unavailable; exposing text for manual copy");
            return DispatchOutcome::new(
                ChannelKind::LocationShare,
                OutcomeStatus::Unsupported,
                format!("sharing is not available; copy this message: {text}"),
            );
        }

        if ctx.location.is_none() {
            log_warn!("no location fix for session {}", ctx.session_id);
            return DispatchOutcome::new(
                ChannelKind::LocationShare,
                OutcomeStatus::Failed,
                format!("no location available, state it on the call; message: {text}"),
            );
        }

        match self.sheet.share(SHARE_TITLE, text).await {
            Ok(()) => {
                log_info!("location shared for session {}", ctx.session_id);
                DispatchOutcome::new(
                    ChannelKind::LocationShare,
                    OutcomeStatus::Succeeded,
                    "location shared",
                )
            }
            Err(err) => DispatchOutcome::new(
                ChannelKind::LocationShare,
                OutcomeStatus::Failed,
                format!("share failed ({err}); copy this message: {text}"),
            ),
        }
    }
}
