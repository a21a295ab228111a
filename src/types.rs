use std::fmt;
use std::time::SystemTime;

/// Placeholder sent for title and artist whenever real metadata is missing
pub const PLACEHOLDER: &str = "None";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackStatus {
    Playing,
    Paused,
    Stopped,
    /// Only produced when the player query itself failed
    Error,
}

impl PlaybackStatus {
    /// Lowercase token used on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            PlaybackStatus::Playing => "playing",
            PlaybackStatus::Paused => "paused",
            PlaybackStatus::Stopped => "stopped",
            PlaybackStatus::Error => "error",
        }
    }

    #[cfg(test)]
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "playing" => Some(PlaybackStatus::Playing),
            "paused" => Some(PlaybackStatus::Paused),
            "stopped" => Some(PlaybackStatus::Stopped),
            "error" => Some(PlaybackStatus::Error),
            _ => None,
        }
    }
}

impl fmt::Display for PlaybackStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical per-cycle view of the player. Built fresh every cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaState {
    pub status: PlaybackStatus,
    pub title: String,
    pub artist: String,
    pub position_seconds: u64,
    pub duration_seconds: u64,
}

impl MediaState {
    /// No player session is active
    pub fn stopped() -> Self {
        Self::idle(PlaybackStatus::Stopped)
    }

    /// The player could not be queried this cycle
    pub fn error() -> Self {
        Self::idle(PlaybackStatus::Error)
    }

    fn idle(status: PlaybackStatus) -> Self {
        Self {
            status,
            title: PLACEHOLDER.to_string(),
            artist: PLACEHOLDER.to_string(),
            position_seconds: 0,
            duration_seconds: 0,
        }
    }

    /// Same track, different position. Used after extrapolation.
    pub fn with_position(self, position_seconds: u64) -> Self {
        Self {
            position_seconds,
            ..self
        }
    }

    /// True when the track (or idle/error condition) differs from `other`,
    /// ignoring playback position.
    pub fn track_changed(&self, other: &MediaState) -> bool {
        self.status != other.status
            || self.title != other.title
            || self.artist != other.artist
            || self.duration_seconds != other.duration_seconds
    }
}

/// One point-in-time read of the host player, exactly as the platform reported it.
/// Any field may be absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawSnapshot {
    pub status: Option<PlaybackStatus>,
    pub title: Option<String>,
    pub artist: Option<String>,
    /// Seconds, as reported (may be negative or NaN on misbehaving players)
    pub position: Option<f64>,
    /// Seconds
    pub duration: Option<f64>,
    /// When the platform sampled `position`. `None` means the position is live.
    pub last_update: Option<SystemTime>,
}

impl RawSnapshot {
    pub fn is_playing(&self) -> bool {
        self.status == Some(PlaybackStatus::Playing)
    }
}

/// Button press relayed from the device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportCommand {
    PlayPause,
    Next,
    Previous,
}

impl TransportCommand {
    /// Token the device sends for this command
    pub fn token(&self) -> &'static str {
        match self {
            TransportCommand::PlayPause => "PLAYPAUSE",
            TransportCommand::Next => "NEXT",
            TransportCommand::Previous => "PREV",
        }
    }
}

impl fmt::Display for TransportCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}
