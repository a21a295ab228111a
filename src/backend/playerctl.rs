use std::time::Duration;

use super::process::run_with_timeout;
use super::{MediaSource, TransportControl};
use crate::error::BackendError;
use crate::types::{PlaybackStatus, RawSnapshot, TransportCommand};

const PLAYERCTL: &str = "playerctl";

/// Unit separator, never present in track metadata
const SEPARATOR: char = '\u{1f}';

const FORMAT: &str =
    "{{status}}\u{1f}{{title}}\u{1f}{{artist}}\u{1f}{{position}}\u{1f}{{mpris:length}}";

const MICROS_PER_SECOND: f64 = 1_000_000.0;

/// MPRIS players on Linux, through the `playerctl` command line tool
pub struct Playerctl {
    timeout: Duration,
}

impl Playerctl {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl MediaSource for Playerctl {
    fn fetch_snapshot(&mut self) -> Result<Option<RawSnapshot>, BackendError> {
        match run_with_timeout(PLAYERCTL, &["metadata", "--format", FORMAT], self.timeout) {
            Ok(output) => parse_metadata(&output),
            Err(BackendError::CommandFailed { stderr, .. }) if no_players(&stderr) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

impl TransportControl for Playerctl {
    fn invoke(&mut self, command: TransportCommand) -> Result<(), BackendError> {
        let verb = match command {
            TransportCommand::PlayPause => "play-pause",
            TransportCommand::Next => "next",
            TransportCommand::Previous => "previous",
        };
        run_with_timeout(PLAYERCTL, &[verb], self.timeout)?;
        Ok(())
    }
}

fn no_players(stderr: &str) -> bool {
    stderr.contains("No players found") || stderr.contains("No player could handle this command")
}

fn parse_metadata(output: &str) -> Result<Option<RawSnapshot>, BackendError> {
    if output.is_empty() {
        return Ok(None);
    }

    let fields: Vec<&str> = output.split(SEPARATOR).collect();
    let [status, title, artist, position, length] = fields.as_slice() else {
        return Err(BackendError::Parse(format!(
            "expected 5 fields from playerctl, got {}",
            fields.len()
        )));
    };

    let status = match *status {
        "Playing" => PlaybackStatus::Playing,
        "Paused" => PlaybackStatus::Paused,
        "Stopped" => PlaybackStatus::Stopped,
        other => {
            return Err(BackendError::Parse(format!("unknown playerctl status {:?}", other)));
        }
    };

    Ok(Some(RawSnapshot {
        status: Some(status),
        title: non_empty(title),
        artist: non_empty(artist),
        position: micros_to_seconds(position),
        duration: micros_to_seconds(length),
        last_update: None,
    }))
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

fn micros_to_seconds(value: &str) -> Option<f64> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .map(|micros| micros / MICROS_PER_SECOND)
}
