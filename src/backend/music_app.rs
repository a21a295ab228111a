use serde::Deserialize;
use std::time::Duration;

use super::process::run_with_timeout;
use super::{MediaSource, TransportControl};
use crate::error::BackendError;
use crate::types::{PlaybackStatus, RawSnapshot, TransportCommand};

const OSASCRIPT: &str = "osascript";

/// Prints a single JSON object describing the Music app's player
const QUERY_SCRIPT: &str = r#"(() => {
  const music = Application('Music');
  if (!music.running()) return JSON.stringify({ running: false });
  const reply = { running: true, state: music.playerState() };
  try {
    const track = music.currentTrack;
    reply.title = track.name();
    reply.artist = track.artist();
    reply.duration = track.duration();
    reply.position = music.playerPosition();
  } catch (e) {}
  return JSON.stringify(reply);
})()"#;

/// Apple Music on macOS, driven through JavaScript for Automation
pub struct MusicApp {
    timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct MusicReply {
    running: bool,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    artist: Option<String>,
    #[serde(default)]
    position: Option<f64>,
    #[serde(default)]
    duration: Option<f64>,
}

impl MusicApp {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    fn run_script(&self, script: &str) -> Result<String, BackendError> {
        run_with_timeout(OSASCRIPT, &["-l", "JavaScript", "-e", script], self.timeout)
    }
}

impl MediaSource for MusicApp {
    fn fetch_snapshot(&mut self) -> Result<Option<RawSnapshot>, BackendError> {
        let output = self.run_script(QUERY_SCRIPT)?;
        parse_reply(&output)
    }
}

impl TransportControl for MusicApp {
    fn invoke(&mut self, command: TransportCommand) -> Result<(), BackendError> {
        let method = match command {
            TransportCommand::PlayPause => "playpause",
            TransportCommand::Next => "nextTrack",
            TransportCommand::Previous => "previousTrack",
        };
        self.run_script(&format!("Application('Music').{}()", method))?;
        Ok(())
    }
}

fn parse_reply(output: &str) -> Result<Option<RawSnapshot>, BackendError> {
    let reply: MusicReply = serde_json::from_str(output)?;
    if !reply.running {
        return Ok(None);
    }

    let status = reply.state.as_deref().map(player_state);

    // Running but idle with nothing loaded is the same as no session
    if status == Some(PlaybackStatus::Stopped) && reply.title.is_none() {
        return Ok(None);
    }

    Ok(Some(RawSnapshot {
        status,
        title: reply.title,
        artist: reply.artist,
        position: reply.position,
        duration: reply.duration,
        // playerPosition is live
        last_update: None,
    }))
}

fn player_state(state: &str) -> PlaybackStatus {
    match state {
        "paused" => PlaybackStatus::Paused,
        "stopped" => PlaybackStatus::Stopped,
        // "playing", "fast forwarding", "rewinding"
        _ => PlaybackStatus::Playing,
    }
}
