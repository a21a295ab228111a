use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant, SystemTime};

use crate::backend::{MediaSource, TransportControl};
use crate::codec::{decode, encode};
use crate::error::LinkError;
use crate::extrapolate::extrapolate;
use crate::link::Link;
use crate::normalize::normalize;
use crate::types::{MediaState, PlaybackStatus};

/// Longest uninterrupted sleep, so a shutdown request is noticed promptly
const SHUTDOWN_CHECK_INTERVAL: Duration = Duration::from_millis(100);

/// Handles opened once at startup and held for the life of the process
pub struct SyncContext<L, B> {
    pub link: L,
    pub backend: B,
}

/// Drives one update per cycle to the device and relays its button presses
pub struct SyncLoop<L, B> {
    ctx: SyncContext<L, B>,
    interval: Duration,
    reconnect_attempts: u32,
    shutdown: Arc<AtomicBool>,
    /// Only used to log track changes once instead of every cycle
    last_state: Option<MediaState>,
}

impl<L, B> SyncLoop<L, B>
where
    L: Link,
    B: MediaSource + TransportControl,
{
    pub fn new(
        ctx: SyncContext<L, B>,
        interval: Duration,
        reconnect_attempts: u32,
        shutdown: Arc<AtomicBool>,
    ) -> Self {
        Self {
            ctx,
            interval,
            reconnect_attempts,
            shutdown,
            last_state: None,
        }
    }

    /// Run cycles until `shutdown` is set. Only a lost serial device ends the loop early.
    ///
    /// The pause between cycles is fixed and does not account for the time a
    /// cycle took.
    pub fn run(&mut self) -> Result<(), LinkError> {
        log::info!("Syncing now-playing state every {:?}", self.interval);

        while !self.shutdown_requested() {
            self.cycle()?;
            sleep_unless_shutdown(self.interval, &self.shutdown);
        }

        log::info!("Sync loop stopped");
        Ok(())
    }

    pub fn cycle(&mut self) -> Result<MediaState, LinkError> {
        self.cycle_at(SystemTime::now())
    }

    /// Query, write, then check for one inbound command
    fn cycle_at(&mut self, now: SystemTime) -> Result<MediaState, LinkError> {
        let state = self.sample(now);
        self.log_transition(&state);

        let line = encode(&state);
        log::debug!("Sending {}", line.trim_end());
        self.send(&line)?;

        self.check_inbound();
        Ok(state)
    }

    fn sample(&mut self, now: SystemTime) -> MediaState {
        let query = self.ctx.backend.fetch_snapshot();
        if let Err(e) = &query {
            log::warn!("Player query failed: {}", e);
        }

        let state = normalize(&query);
        match query {
            Ok(Some(raw)) => {
                let position = extrapolate(
                    &state,
                    raw.position.unwrap_or(0.0),
                    raw.last_update,
                    now,
                    raw.is_playing(),
                );
                state.with_position(position)
            }
            _ => state,
        }
    }

    fn log_transition(&mut self, state: &MediaState) {
        let changed = self
            .last_state
            .as_ref()
            .map_or(true, |last| last.track_changed(state));

        if changed {
            match state.status {
                PlaybackStatus::Playing | PlaybackStatus::Paused => log::info!(
                    "Now {}: {} - {} ({}s)",
                    state.status,
                    state.title,
                    state.artist,
                    state.duration_seconds
                ),
                PlaybackStatus::Stopped => log::info!("No active player"),
                PlaybackStatus::Error => log::info!("Player state unavailable"),
            }
        }

        self.last_state = Some(state.clone());
    }

    fn shutdown_requested(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    /// Write a line, reopening the port up to `reconnect_attempts` times if it fails
    fn send(&mut self, line: &str) -> Result<(), LinkError> {
        let error = match self.ctx.link.write_line(line) {
            Ok(()) => return Ok(()),
            Err(e) => e,
        };
        log::error!("{}", error);

        for attempt in 1..=self.reconnect_attempts {
            let backoff = self.interval * attempt;
            log::warn!(
                "Reconnecting to serial device in {:?} (attempt {}/{})",
                backoff,
                attempt,
                self.reconnect_attempts
            );
            sleep_unless_shutdown(backoff, &self.shutdown);
            if self.shutdown_requested() {
                log::info!("Shutdown requested, giving up on the serial device");
                break;
            }

            let link = &mut self.ctx.link;
            match link.reopen().and_then(|_| link.write_line(line)) {
                Ok(()) => {
                    log::info!("Serial device reconnected");
                    return Ok(());
                }
                Err(e) => log::warn!("Reconnect attempt {} failed: {}", attempt, e),
            }
        }

        Err(error)
    }

    fn check_inbound(&mut self) {
        let line = match self.ctx.link.poll_line() {
            Ok(Some(line)) => line,
            Ok(None) => return,
            Err(e) => {
                log::warn!("{}", e);
                return;
            }
        };

        log::debug!("Received {:?}", String::from_utf8_lossy(&line).trim_end());

        let Some(command) = decode(&line) else {
            return;
        };

        log::info!("Button pressed: {}", command);
        if let Err(e) = self.ctx.backend.invoke(command) {
            log::warn!("Failed to send {} to the player: {}", command, e);
        }
    }
}

fn sleep_unless_shutdown(total: Duration, shutdown: &AtomicBool) {
    let deadline = Instant::now() + total;
    loop {
        if shutdown.load(Ordering::SeqCst) {
            return;
        }
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return;
        }
        thread::sleep(remaining.min(SHUTDOWN_CHECK_INTERVAL));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BackendError;
    use crate::types::{RawSnapshot, TransportCommand};
    use std::collections::VecDeque;
    use std::io;

    #[derive(Default)]
    struct FakeLink {
        written: Vec<String>,
        inbound: VecDeque<Result<Vec<u8>, LinkError>>,
        failing_writes: usize,
        reopened: usize,
        reopen_fails: bool,
    }

    impl Link for FakeLink {
        fn write_line(&mut self, line: &str) -> Result<(), LinkError> {
            if self.failing_writes > 0 {
                self.failing_writes -= 1;
                return Err(LinkError::Write(io::Error::new(
                    io::ErrorKind::BrokenPipe,
                    "device unplugged",
                )));
            }
            self.written.push(line.to_string());
            Ok(())
        }

        fn poll_line(&mut self) -> Result<Option<Vec<u8>>, LinkError> {
            self.inbound.pop_front().transpose()
        }

        fn reopen(&mut self) -> Result<(), LinkError> {
            self.reopened += 1;
            if self.reopen_fails {
                return Err(LinkError::Write(io::Error::new(io::ErrorKind::NotFound, "gone")));
            }
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakePlayer {
        snapshots: VecDeque<Result<Option<RawSnapshot>, BackendError>>,
        invoked: Vec<TransportCommand>,
        fail_invoke: bool,
    }

    impl MediaSource for FakePlayer {
        fn fetch_snapshot(&mut self) -> Result<Option<RawSnapshot>, BackendError> {
            self.snapshots.pop_front().unwrap_or(Ok(None))
        }
    }

    impl TransportControl for FakePlayer {
        fn invoke(&mut self, command: TransportCommand) -> Result<(), BackendError> {
            self.invoked.push(command);
            if self.fail_invoke {
                return Err(BackendError::Platform("player went away".to_string()));
            }
            Ok(())
        }
    }

    fn sync(link: FakeLink, player: FakePlayer) -> SyncLoop<FakeLink, FakePlayer> {
        SyncLoop::new(
            SyncContext {
                link,
                backend: player,
            },
            Duration::ZERO,
            0,
            Arc::new(AtomicBool::new(false)),
        )
    }

    fn snapshot(position: f64, last_update: Option<SystemTime>) -> RawSnapshot {
        RawSnapshot {
            status: Some(PlaybackStatus::Playing),
            title: Some("Bohemian Rhapsody".to_string()),
            artist: Some("Queen".to_string()),
            position: Some(position),
            duration: Some(200.0),
            last_update,
        }
    }

    fn timeout() -> BackendError {
        BackendError::Timeout {
            program: "osascript".to_string(),
            timeout: Duration::from_secs(3),
        }
    }

    fn t0() -> SystemTime {
        SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000)
    }

    #[test]
    fn idle_cycle_sends_stopped_line() {
        let mut sync = sync(FakeLink::default(), FakePlayer::default());
        sync.cycle().unwrap();
        assert_eq!(sync.ctx.link.written, vec!["stopped|None|None|0|0\n"]);
    }

    #[test]
    fn live_position_is_sent_unchanged() {
        let player = FakePlayer {
            snapshots: VecDeque::from([Ok(Some(snapshot(142.8, None)))]),
            ..Default::default()
        };
        let mut sync = sync(FakeLink::default(), player);
        sync.cycle_at(t0() + Duration::from_secs(30)).unwrap();
        assert_eq!(
            sync.ctx.link.written,
            vec!["playing|Bohemian Rhapsody|Queen|142|200\n"]
        );
    }

    #[test]
    fn stale_position_is_extrapolated() {
        let player = FakePlayer {
            snapshots: VecDeque::from([
                Ok(Some(snapshot(100.0, Some(t0())))),
                Ok(Some(snapshot(198.0, Some(t0())))),
            ]),
            ..Default::default()
        };
        let mut sync = sync(FakeLink::default(), player);

        let state = sync.cycle_at(t0() + Duration::from_secs(5)).unwrap();
        assert_eq!(state.position_seconds, 105);

        let state = sync.cycle_at(t0() + Duration::from_secs(10)).unwrap();
        assert_eq!(state.position_seconds, 200);

        assert_eq!(
            sync.ctx.link.written[0],
            "playing|Bohemian Rhapsody|Queen|105|200\n"
        );
    }

    #[test]
    fn paused_position_is_not_extrapolated() {
        let mut paused = snapshot(100.0, Some(t0()));
        paused.status = Some(PlaybackStatus::Paused);
        let player = FakePlayer {
            snapshots: VecDeque::from([Ok(Some(paused))]),
            ..Default::default()
        };
        let mut sync = sync(FakeLink::default(), player);
        let state = sync.cycle_at(t0() + Duration::from_secs(60)).unwrap();
        assert_eq!(state.position_seconds, 100);
    }

    #[test]
    fn recognised_command_is_invoked_once() {
        let link = FakeLink {
            inbound: VecDeque::from([Ok(b"NEXT\n".to_vec())]),
            ..Default::default()
        };
        let mut sync = sync(link, FakePlayer::default());
        sync.cycle().unwrap();
        sync.cycle().unwrap();
        assert_eq!(sync.ctx.backend.invoked, vec![TransportCommand::Next]);
    }

    #[test]
    fn unknown_command_is_ignored() {
        let link = FakeLink {
            inbound: VecDeque::from([Ok(b"FOO\n".to_vec())]),
            ..Default::default()
        };
        let mut sync = sync(link, FakePlayer::default());
        sync.cycle().unwrap();
        assert!(sync.ctx.backend.invoked.is_empty());
        assert_eq!(sync.ctx.link.written.len(), 1);
    }

    #[test]
    fn one_inbound_line_per_cycle() {
        let link = FakeLink {
            inbound: VecDeque::from([Ok(b"PLAYPAUSE\n".to_vec()), Ok(b"PREV\n".to_vec())]),
            ..Default::default()
        };
        let mut sync = sync(link, FakePlayer::default());
        sync.cycle().unwrap();
        assert_eq!(sync.ctx.backend.invoked, vec![TransportCommand::PlayPause]);
        sync.cycle().unwrap();
        assert_eq!(
            sync.ctx.backend.invoked,
            vec![TransportCommand::PlayPause, TransportCommand::Previous]
        );
    }

    #[test]
    fn query_failure_sends_error_and_loop_continues() {
        let player = FakePlayer {
            snapshots: VecDeque::from([Err(timeout()), Ok(Some(snapshot(10.0, None)))]),
            ..Default::default()
        };
        let mut sync = sync(FakeLink::default(), player);

        let first = sync.cycle().unwrap();
        assert_eq!(first.status, PlaybackStatus::Error);
        let second = sync.cycle().unwrap();
        assert_eq!(second.status, PlaybackStatus::Playing);

        assert_eq!(
            sync.ctx.link.written,
            vec![
                "error|None|None|0|0\n",
                "playing|Bohemian Rhapsody|Queen|10|200\n"
            ]
        );
    }

    #[test]
    fn query_failure_does_not_block_commands() {
        let player = FakePlayer {
            snapshots: VecDeque::from([Err(timeout())]),
            ..Default::default()
        };
        let link = FakeLink {
            inbound: VecDeque::from([Ok(b"PLAYPAUSE\n".to_vec())]),
            ..Default::default()
        };
        let mut sync = sync(link, player);
        sync.cycle().unwrap();
        assert_eq!(sync.ctx.backend.invoked, vec![TransportCommand::PlayPause]);
    }

    #[test]
    fn command_failure_is_not_fatal() {
        let player = FakePlayer {
            fail_invoke: true,
            ..Default::default()
        };
        let link = FakeLink {
            inbound: VecDeque::from([Ok(b"NEXT\n".to_vec())]),
            ..Default::default()
        };
        let mut sync = sync(link, player);
        sync.cycle().unwrap();
        sync.cycle().unwrap();
        assert_eq!(sync.ctx.link.written.len(), 2);
    }

    #[test]
    fn read_error_is_not_fatal() {
        let link = FakeLink {
            inbound: VecDeque::from([Err(LinkError::Read(io::Error::new(
                io::ErrorKind::Other,
                "framing error",
            )))]),
            ..Default::default()
        };
        let mut sync = sync(link, FakePlayer::default());
        sync.cycle().unwrap();
        sync.cycle().unwrap();
        assert_eq!(sync.ctx.link.written.len(), 2);
    }

    #[test]
    fn write_failure_is_fatal_without_reconnect() {
        let link = FakeLink {
            failing_writes: 1,
            ..Default::default()
        };
        let mut sync = sync(link, FakePlayer::default());
        assert!(matches!(sync.cycle(), Err(LinkError::Write(_))));
        assert_eq!(sync.ctx.link.reopened, 0);
    }

    #[test]
    fn reconnect_resends_the_line() {
        let link = FakeLink {
            failing_writes: 1,
            ..Default::default()
        };
        let mut sync = sync(link, FakePlayer::default());
        sync.reconnect_attempts = 3;
        sync.cycle().unwrap();
        assert_eq!(sync.ctx.link.reopened, 1);
        assert_eq!(sync.ctx.link.written, vec!["stopped|None|None|0|0\n"]);
    }

    #[test]
    fn reconnect_gives_up_after_configured_attempts() {
        let link = FakeLink {
            failing_writes: 1,
            reopen_fails: true,
            ..Default::default()
        };
        let mut sync = sync(link, FakePlayer::default());
        sync.reconnect_attempts = 2;
        assert!(matches!(sync.cycle(), Err(LinkError::Write(_))));
        assert_eq!(sync.ctx.link.reopened, 2);
    }

    #[test]
    fn run_returns_when_shutdown_is_requested() {
        let mut sync = sync(FakeLink::default(), FakePlayer::default());
        sync.shutdown.store(true, Ordering::SeqCst);
        sync.run().unwrap();
        assert!(sync.ctx.link.written.is_empty());
    }

    #[test]
    fn run_ends_on_lost_device() {
        let link = FakeLink {
            failing_writes: 1,
            ..Default::default()
        };
        let mut sync = sync(link, FakePlayer::default());
        assert!(sync.run().is_err());
    }

    #[test]
    fn shutdown_interrupts_reconnect_backoff() {
        let link = FakeLink {
            failing_writes: 1,
            reopen_fails: true,
            ..Default::default()
        };
        let mut sync = sync(link, FakePlayer::default());
        sync.interval = Duration::from_secs(60);
        sync.reconnect_attempts = 1000;

        let shutdown = sync.shutdown.clone();
        let signal = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            shutdown.store(true, Ordering::SeqCst);
        });

        let started = Instant::now();
        assert!(matches!(sync.cycle(), Err(LinkError::Write(_))));
        signal.join().unwrap();

        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(sync.ctx.link.reopened, 0);
    }
}
