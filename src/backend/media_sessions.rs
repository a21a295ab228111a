use std::time::{Duration, SystemTime};

use windows::Foundation::DateTime;
use windows::Media::Control::{
    GlobalSystemMediaTransportControlsSession as MediaSession,
    GlobalSystemMediaTransportControlsSessionManager as MediaSessionManager,
    GlobalSystemMediaTransportControlsSessionPlaybackStatus as SessionStatus,
};

use super::{MediaSource, TransportControl};
use crate::error::BackendError;
use crate::types::{PlaybackStatus, RawSnapshot, TransportCommand};

/// 100ns ticks between 1601-01-01 and the Unix epoch
const EPOCH_DIFFERENCE_TICKS: i64 = 116_444_736_000_000_000;
const TICKS_PER_SECOND: f64 = 10_000_000.0;

/// Windows Global System Media Transport Controls.
///
/// The session manager is requested once and held for the life of the process.
pub struct MediaSessions {
    manager: MediaSessionManager,
}

impl MediaSessions {
    pub fn open() -> Result<Self, BackendError> {
        let manager = MediaSessionManager::RequestAsync()
            .and_then(|op| op.get())
            .map_err(platform)?;
        log::info!("Connected to the Windows media session manager");
        Ok(Self { manager })
    }

    fn current_session(&self) -> Option<MediaSession> {
        self.manager.GetCurrentSession().ok()
    }
}

impl MediaSource for MediaSessions {
    fn fetch_snapshot(&mut self) -> Result<Option<RawSnapshot>, BackendError> {
        let Some(session) = self.current_session() else {
            return Ok(None);
        };

        let status = session
            .GetPlaybackInfo()
            .and_then(|info| info.PlaybackStatus())
            .map_err(platform)?;
        // A closed session is the same as no player at all
        let Some(status) = session_status(status) else {
            return Ok(None);
        };

        let properties = session
            .TryGetMediaPropertiesAsync()
            .and_then(|op| op.get())
            .map_err(platform)?;
        let timeline = session.GetTimelineProperties().map_err(platform)?;

        let start = timeline.StartTime().map(|t| t.Duration).unwrap_or(0);
        let position = timeline.Position().ok().map(|t| ticks_to_seconds(t.Duration - start));
        let duration = timeline.EndTime().ok().map(|t| ticks_to_seconds(t.Duration - start));

        Ok(Some(RawSnapshot {
            status: Some(status),
            title: properties.Title().ok().map(|s| s.to_string()),
            artist: properties.Artist().ok().map(|s| s.to_string()),
            position,
            duration,
            // Windows only refreshes the position on transport events
            last_update: timeline.LastUpdatedTime().ok().and_then(to_system_time),
        }))
    }
}

impl TransportControl for MediaSessions {
    fn invoke(&mut self, command: TransportCommand) -> Result<(), BackendError> {
        let Some(session) = self.current_session() else {
            log::debug!("No media session to send {} to", command);
            return Ok(());
        };

        let accepted = match command {
            TransportCommand::PlayPause => session.TryTogglePlayPauseAsync(),
            TransportCommand::Next => session.TrySkipNextAsync(),
            TransportCommand::Previous => session.TrySkipPreviousAsync(),
        }
        .and_then(|op| op.get())
        .map_err(platform)?;

        if !accepted {
            log::warn!("Media session declined {}", command);
        }
        Ok(())
    }
}

/// `None` for a closed session
fn session_status(status: SessionStatus) -> Option<PlaybackStatus> {
    if status == SessionStatus::Closed {
        None
    } else if status == SessionStatus::Playing {
        Some(PlaybackStatus::Playing)
    } else if status == SessionStatus::Stopped {
        Some(PlaybackStatus::Stopped)
    } else {
        Some(PlaybackStatus::Paused)
    }
}

fn ticks_to_seconds(ticks: i64) -> f64 {
    ticks as f64 / TICKS_PER_SECOND
}

fn to_system_time(time: DateTime) -> Option<SystemTime> {
    let ticks = time.UniversalTime - EPOCH_DIFFERENCE_TICKS;
    if ticks < 0 {
        return None;
    }
    Some(SystemTime::UNIX_EPOCH + Duration::from_nanos(ticks as u64 * 100))
}

fn platform(error: windows::core::Error) -> BackendError {
    BackendError::Platform(error.message().to_string())
}
