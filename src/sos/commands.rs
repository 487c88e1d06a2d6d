use std::str::FromStr;

use crate::{
    models::{EmergencyContact, OutcomeStatus, SosPhase},
    sos::{SosController, SosEvent, SosSnapshot},
};

use crate::AppState;

const HELP: &str = "\
Commands:
  arm       start the SOS countdown (alarm sounds, help is sent when it ends)
  cancel    stop the countdown before it ends
  reset     acknowledge an active SOS and return to idle
  status    show the SOS state and latest sensor readings
  fakecall  schedule a decoy incoming call
  contacts  list emergency contacts
  reload    re-read emergency contacts from the settings file
  help      show this message
  quit      leave the safety view";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellCommand {
    Arm,
    Cancel,
    Reset,
    Status,
    FakeCall,
    Contacts,
    Reload,
    Help,
    Quit,
}

impl FromStr for ShellCommand {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.trim().to_ascii_lowercase().as_str() {
            "arm" | "sos" => Ok(Self::Arm),
            "cancel" | "c" => Ok(Self::Cancel),
            "reset" | "ok" => Ok(Self::Reset),
            "status" | "s" => Ok(Self::Status),
            "fakecall" | "fake" => Ok(Self::FakeCall),
            "contacts" => Ok(Self::Contacts),
            "reload" => Ok(Self::Reload),
            "help" | "?" => Ok(Self::Help),
            "quit" | "exit" | "q" => Ok(Self::Quit),
            other => Err(format!("unknown command '{other}', type 'help'")),
        }
    }
}

pub enum Reply {
    Print(String),
    Quit,
}

fn controller_from_state(state: &AppState) -> SosController {
    state.sos.clone()
}

pub fn get_sos_state(state: &AppState) -> SosSnapshot {
    controller_from_state(state).snapshot()
}

pub fn arm_sos(state: &AppState) -> Result<SosSnapshot, String> {
    controller_from_state(state).arm().map_err(|e| e.to_string())
}

pub fn cancel_sos(state: &AppState) -> SosSnapshot {
    controller_from_state(state).cancel()
}

pub fn reset_sos(state: &AppState) -> SosSnapshot {
    controller_from_state(state).reset()
}

pub fn list_contacts(state: &AppState) -> Vec<EmergencyContact> {
    state.settings.contacts()
}

/// Re-reads the settings file. Only contact listings pick up the change; the
/// running controller keeps the settings it was built with.
pub fn reload_settings(state: &AppState) -> Result<Vec<EmergencyContact>, String> {
    state.settings.reload().map_err(|e| format!("{e:#}"))?;
    Ok(list_contacts(state))
}

pub fn execute(state: &AppState, command: ShellCommand) -> Reply {
    let text = match command {
        ShellCommand::Arm => match arm_sos(state) {
            Ok(snapshot) => render_snapshot(&snapshot),
            Err(err) => format!("SOS unavailable: {err}"),
        },
        ShellCommand::Cancel => render_snapshot(&cancel_sos(state)),
        ShellCommand::Reset => render_snapshot(&reset_sos(state)),
        ShellCommand::Status => render_snapshot(&get_sos_state(state)),
        ShellCommand::FakeCall => {
            let call = controller_from_state(state).fake_call();
            format!("Fake call from {} in {}s", call.caller, call.ring_in_secs)
        }
        ShellCommand::Contacts => render_contacts(&list_contacts(state)),
        ShellCommand::Reload => match reload_settings(state) {
            Ok(contacts) => format!("Settings reloaded\n{}", render_contacts(&contacts)),
            Err(err) => format!("Reload failed: {err}"),
        },
        ShellCommand::Help => HELP.to_string(),
        ShellCommand::Quit => return Reply::Quit,
    };
    Reply::Print(text)
}

pub fn render_contacts(contacts: &[EmergencyContact]) -> String {
    if contacts.is_empty() {
        return "No emergency contacts configured".to_string();
    }
    contacts
        .iter()
        .map(|c| format!("  {} ({}): {}", c.name, c.relation, c.phone_number))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn render_snapshot(snapshot: &SosSnapshot) -> String {
    let session = &snapshot.session;
    let mut lines = Vec::new();

    let headline = match session.phase {
        SosPhase::Arming { remaining } => format!("SOS arming: sending help in {remaining}s"),
        phase => format!("SOS {}", phase.as_str()),
    };
    lines.push(headline);
    if snapshot.alarm_active {
        lines.push("  alarm sounding".to_string());
    }

    let sensors = &snapshot.sensors;
    lines.push(format!(
        "  location: {} | battery: {} | heading: {}",
        sensors.location_label(),
        sensors.battery_label(),
        sensors.heading_label()
    ));

    for outcome in &session.dispatch_result {
        lines.push(format!(
            "  {:<14} {:<11} {}",
            outcome.channel.as_str(),
            status_label(outcome.status),
            outcome.detail
        ));
    }
    for pending in session.pending_channels() {
        lines.push(format!("  {:<14} pending", pending.as_str()));
    }

    lines.join("\n")
}

/// One line per event worth showing; full snapshots are left to `status`.
pub fn render_event(event: &SosEvent) -> Option<String> {
    match event {
        SosEvent::Tick { remaining, .. } if *remaining > 0 => Some(format!("  {remaining}...")),
        SosEvent::Tick { .. } => None,
        SosEvent::StateChanged(snapshot) => match snapshot.session.phase {
            SosPhase::Dispatching => Some("Sending help now".to_string()),
            SosPhase::Active => Some(render_snapshot(snapshot)),
            SosPhase::Cancelled => Some("SOS cancelled".to_string()),
            SosPhase::Idle | SosPhase::Arming { .. } => None,
        },
        SosEvent::OutcomeRecorded { outcome, .. } => Some(format!(
            "  {} -> {}: {}",
            outcome.channel.as_str(),
            status_label(outcome.status),
            outcome.detail
        )),
        SosEvent::FakeCallIncoming(call) => Some(format!("Incoming call: {}", call.caller)),
        SosEvent::Unavailable { reason } => Some(format!("SOS unavailable: {reason}")),
    }
}

fn status_label(status: OutcomeStatus) -> &'static str {
    match status {
        OutcomeStatus::Attempted => "attempted",
        OutcomeStatus::Succeeded => "succeeded",
        OutcomeStatus::Failed => "failed",
        OutcomeStatus::Unsupported => "unsupported",
    }
}
