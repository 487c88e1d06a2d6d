pub mod audio;
pub mod dispatch;
pub mod error;
pub mod models;
pub mod platform;
pub mod sensing;
pub mod settings;
pub mod sos;
pub mod utils;

#[cfg(test)]
mod test_support;

use std::path::PathBuf;
use std::sync::Arc;

use audio::default_alarm;
use dispatch::{BackendLogChannel, DispatchChannel, LocationShareChannel, TelephonyChannel};
use log::{info, warn};
use platform::{StaticIdentity, SystemDialer, UnsupportedShareSheet};
use sensing::{desktop_sources, SensorStreamManager};
use settings::SettingsStore;
use sos::{
    commands::{self, Reply, ShellCommand},
    SosController, SosDependencies, SosEvent,
};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::{self, error::RecvError};

const SETTINGS_ENV: &str = "TRIPSAFE_SETTINGS";
const DEFAULT_SETTINGS_FILE: &str = "tripsafe.json";

/// What the shell commands operate on. The shell never holds session state
/// of its own.
pub struct AppState {
    pub sos: SosController,
    pub settings: SettingsStore,
}

pub fn run() -> anyhow::Result<()> {
    let settings_path = std::env::var(SETTINGS_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_SETTINGS_FILE));
    let store = SettingsStore::new(settings_path)?;
    utils::logging::init(&store.current());

    info!("TripSafe starting up (settings: {})", store.path().display());

    // One thread: ticks, sensor writes and outcome writes never run in parallel.
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(run_shell(store))
}

async fn run_shell(store: SettingsStore) -> anyhow::Result<()> {
    let settings = store.current();

    // Sensors live exactly as long as the safety view.
    let mut sensors = SensorStreamManager::new(desktop_sources(&settings));
    sensors.start()?;

    let channels: Vec<Arc<dyn DispatchChannel>> = vec![
        Arc::new(TelephonyChannel::new(Arc::new(SystemDialer))),
        Arc::new(LocationShareChannel::new(Arc::new(UnsupportedShareSheet))),
        Arc::new(BackendLogChannel::new(&settings.backend_log)),
    ];
    let sos = SosController::new(
        settings.clone(),
        SosDependencies {
            alarm: default_alarm(settings.siren),
            channels,
            sensors: sensors.reader(),
            identity: Arc::new(StaticIdentity::new(settings.user_id.clone())),
        },
    );

    let state = AppState {
        sos,
        settings: store,
    };
    let printer = tokio::spawn(print_events(state.sos.subscribe()));

    println!("{}", commands::render_snapshot(&commands::get_sos_state(&state)));
    println!("Type 'help' for commands.");

    serve_commands(&state, BufReader::new(tokio::io::stdin())).await;
    printer.abort();
    sensors.stop().await;

    info!("TripSafe shut down");
    Ok(())
}

/// Runs commands until `quit`, end of input or a read error, then shuts the
/// controller down. Every exit path reaches the shutdown policy.
async fn serve_commands<R>(state: &AppState, input: R)
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(err) => {
                warn!("Stopped reading commands: {err}");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        match line.parse::<ShellCommand>() {
            Ok(command) => match commands::execute(state, command) {
                Reply::Print(text) => println!("{text}"),
                Reply::Quit => break,
            },
            Err(err) => println!("{err}"),
        }
    }

    state.sos.shutdown().await;
}

async fn print_events(mut events: broadcast::Receiver<SosEvent>) {
    loop {
        match events.recv().await {
            Ok(event) => {
                if let Some(line) = commands::render_event(&event) {
                    println!("{line}");
                }
            }
            Err(RecvError::Lagged(skipped)) => warn!("Display fell behind by {skipped} events"),
            Err(RecvError::Closed) => break,
        }
    }
}
