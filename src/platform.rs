//! Platform capability surface: call initiation, native share, identity.
//!
//! Every capability is checked with `is_available` before use; an absent
//! capability degrades the channel that needs it, nothing else.

use async_trait::async_trait;
use log::{debug, info, warn};
use std::io;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};

use crate::error::ChannelError;

pub trait Dialer: Send + Sync {
    fn is_available(&self) -> bool;

    /// Hands a `tel:` URI to the platform. Returns once the request is issued;
    /// whether the call connects is never observable from here.
    fn dial(&self, uri: &str) -> Result<(), ChannelError>;
}

#[async_trait]
pub trait ShareSheet: Send + Sync {
    fn is_available(&self) -> bool;

    async fn share(&self, title: &str, text: &str) -> Result<(), ChannelError>;
}

/// Current signed-in user, if any. Anonymous users can still raise an SOS.
pub trait IdentityProvider: Send + Sync {
    fn current_user_id(&self) -> Option<String>;
}

pub fn tel_uri(number: &str) -> String {
    let digits: String = number
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '+')
        .collect();
    format!("tel:{digits}")
}

/// Opens `tel:` URIs through the desktop's URI handler.
pub struct SystemDialer;

impl SystemDialer {
    fn opener(uri: &str) -> Option<Command> {
        #[cfg(target_os = "macos")]
        {
            let mut cmd = Command::new("open");
            cmd.arg(uri);
            Some(cmd)
        }

        #[cfg(target_os = "windows")]
        {
            let mut cmd = Command::new("cmd");
            cmd.args(["/C", "start", "", uri]);
            Some(cmd)
        }

        #[cfg(all(unix, not(target_os = "macos")))]
        {
            let mut cmd = Command::new("xdg-open");
            cmd.arg(uri);
            Some(cmd)
        }

        #[cfg(not(any(unix, target_os = "windows")))]
        {
            let _ = uri;
            None
        }
    }
}

impl Dialer for SystemDialer {
    fn is_available(&self) -> bool {
        cfg!(any(unix, target_os = "windows"))
    }

    fn dial(&self, uri: &str) -> Result<(), ChannelError> {
        let mut cmd = Self::opener(uri)
            .ok_or_else(|| ChannelError::CapabilityUnsupported("no URI opener".into()))?;
        // Spawn without waiting: the handler may stay open for the whole call.
        let child = cmd
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|err| ChannelError::Platform(format!("failed to open {uri}: {err}")))?;
        info!("Handed {uri} to the system URI opener");

        if let Err(err) = reap(child) {
            warn!("Could not watch the URI opener ({err}); it will be reaped on exit");
        }
        Ok(())
    }
}

/// Waits on the opener from a detached thread so it never lingers as a zombie.
fn reap(mut child: Child) -> io::Result<JoinHandle<Option<ExitStatus>>> {
    thread::Builder::new()
        .name("uri-opener".to_string())
        .spawn(move || match child.wait() {
            Ok(status) => {
                debug!("URI opener exited with {status}");
                Some(status)
            }
            Err(err) => {
                warn!("URI opener could not be waited on: {err}");
                None
            }
        })
}

/// Desktop builds have no native share sheet.
pub struct UnsupportedShareSheet;

#[async_trait]
impl ShareSheet for UnsupportedShareSheet {
    fn is_available(&self) -> bool {
        false
    }

    async fn share(&self, _title: &str, _text: &str) -> Result<(), ChannelError> {
        warn!("Share requested on a platform without a share sheet");
        Err(ChannelError::CapabilityUnsupported("share sheet".into()))
    }
}

pub struct StaticIdentity {
    user_id: Option<String>,
}

impl StaticIdentity {
    pub fn new(user_id: Option<String>) -> Self {
        Self {
            user_id: user_id.filter(|id| !id.trim().is_empty()),
        }
    }

    pub fn anonymous() -> Self {
        Self { user_id: None }
    }
}

impl IdentityProvider for StaticIdentity {
    fn current_user_id(&self) -> Option<String> {
        self.user_id.clone()
    }
}
