//! Host media player collaborators.
//!
//! The sync loop only sees [`MediaSource`] and [`TransportControl`]; how a
//! platform is actually queried stays behind these traits.

mod music_app;
mod playerctl;
mod process;
#[cfg(target_os = "windows")]
mod media_sessions;

use std::time::Duration;

use clap::ValueEnum;

use crate::error::BackendError;
use crate::types::{RawSnapshot, TransportCommand};

use music_app::MusicApp;
use playerctl::Playerctl;
#[cfg(target_os = "windows")]
use media_sessions::MediaSessions;

/// Reads the host player's state
pub trait MediaSource {
    /// `Ok(None)` when no player session is active
    fn fetch_snapshot(&mut self) -> Result<Option<RawSnapshot>, BackendError>;
}

/// Sends transport commands to the host player
pub trait TransportControl {
    fn invoke(&mut self, command: TransportCommand) -> Result<(), BackendError>;
}

/// A platform backend provides both halves
pub trait PlayerBackend: MediaSource + TransportControl {}

impl<T: MediaSource + TransportControl + ?Sized> PlayerBackend for T {}

impl<T: MediaSource + ?Sized> MediaSource for Box<T> {
    fn fetch_snapshot(&mut self) -> Result<Option<RawSnapshot>, BackendError> {
        (**self).fetch_snapshot()
    }
}

impl<T: TransportControl + ?Sized> TransportControl for Box<T> {
    fn invoke(&mut self, command: TransportCommand) -> Result<(), BackendError> {
        (**self).invoke(command)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BackendKind {
    /// Apple Music on macOS
    MusicApp,
    /// Any MPRIS player on Linux, via playerctl
    Playerctl,
    /// Windows media sessions (Spotify, browsers, Media Player, ...)
    Windows,
}

impl Default for BackendKind {
    fn default() -> Self {
        if cfg!(target_os = "macos") {
            BackendKind::MusicApp
        } else if cfg!(target_os = "windows") {
            BackendKind::Windows
        } else {
            BackendKind::Playerctl
        }
    }
}

/// Construct the chosen backend. `timeout` bounds each external query or command.
pub fn open(kind: BackendKind, timeout: Duration) -> Result<Box<dyn PlayerBackend>, BackendError> {
    log::info!("Using {:?} media backend", kind);
    match kind {
        BackendKind::MusicApp => Ok(Box::new(MusicApp::new(timeout))),
        BackendKind::Playerctl => Ok(Box::new(Playerctl::new(timeout))),
        #[cfg(target_os = "windows")]
        BackendKind::Windows => Ok(Box::new(MediaSessions::open()?)),
        #[cfg(not(target_os = "windows"))]
        BackendKind::Windows => Err(BackendError::Platform(
            "the windows backend is only available on Windows".to_string(),
        )),
    }
}
