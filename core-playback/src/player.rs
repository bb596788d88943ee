//! # Player Sessions
//!
//! One [`PlayerSession`] per session key. A session owns at most one loaded
//! native track, drives a position ticker while playing and applies the
//! configured [`FinishMode`] when the track reaches its natural end.
//!
//! ## State Machine
//!
//! ```text
//!            prepare            start
//!   (any) ──────────► Stopped ─────────► Playing ◄──┐
//!                        ▲                 │  ▲     │ start
//!                   stop │           pause │  │     │
//!                        │                 ▼  │     │
//!                        └──────────────── Paused ──┘
//! ```
//!
//! All transitions and ticks for one session are serialized behind one
//! `tokio::sync::Mutex`. Events go to the shared [`EventBus`] unless the
//! session was marked unmounted.

use crate::error::{PlaybackError, Result};
use bridge_traits::playback::{PlaybackBackend, PlaybackHandle, PlaybackOptions};
use core_runtime::config::{EngineConfig, UpdateIntervals};
use core_runtime::events::{CoreEvent, EventBus, PlayerEvent};
use core_runtime::session::{DurationType, FinishMode, PlayerState, SessionKey, UpdateFrequency};
use core_runtime::ticker::{TickControl, Ticker};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, trace, warn};

// ============================================================================
// Settings & Requests
// ============================================================================

/// Engine-wide knobs a player session needs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayerSettings {
    pub update_intervals: UpdateIntervals,
    /// Speeds above this are clamped.
    pub max_playback_speed: f32,
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self::from(&EngineConfig::default())
    }
}

impl From<&EngineConfig> for PlayerSettings {
    fn from(config: &EngineConfig) -> Self {
        Self {
            update_intervals: config.update_intervals,
            max_playback_speed: config.max_playback_speed,
        }
    }
}

impl PlayerSettings {
    /// Coerce a requested speed: non-finite or non-positive becomes 1.0,
    /// anything above the maximum is clamped.
    pub fn coerce_speed(&self, speed: Option<f32>) -> f32 {
        match speed {
            Some(s) if s.is_finite() && s > 0.0 => s.min(self.max_playback_speed),
            _ => 1.0,
        }
    }
}

/// Arguments of [`PlayerSession::prepare`].
#[derive(Debug, Clone, PartialEq)]
pub struct PrepareRequest {
    pub path: PathBuf,
    /// 0.0 to 1.0. Default: 1.0
    pub volume: f32,
    /// Default: 1.0
    pub speed: f32,
    /// Default: [`UpdateFrequency::Medium`]
    pub frequency: UpdateFrequency,
    /// Default: 0
    pub start_position_ms: u64,
}

impl PrepareRequest {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            volume: 1.0,
            speed: 1.0,
            frequency: UpdateFrequency::default(),
            start_position_ms: 0,
        }
    }

    pub fn with_volume(mut self, volume: f32) -> Self {
        self.volume = volume;
        self
    }

    pub fn with_speed(mut self, speed: f32) -> Self {
        self.speed = speed;
        self
    }

    pub fn with_frequency(mut self, frequency: UpdateFrequency) -> Self {
        self.frequency = frequency;
        self
    }

    pub fn with_start_position_ms(mut self, position_ms: u64) -> Self {
        self.start_position_ms = position_ms;
        self
    }
}

fn valid_volume(volume: f32) -> bool {
    volume.is_finite() && (0.0..=1.0).contains(&volume)
}

fn millis(duration: Duration) -> u64 {
    duration.as_millis().min(u64::MAX as u128) as u64
}

// ============================================================================
// Event Emission
// ============================================================================

/// Emits player events for one key, honouring the mounted flag.
#[derive(Clone)]
struct Notifier {
    key: SessionKey,
    bus: EventBus,
    mounted: Arc<AtomicBool>,
}

impl Notifier {
    fn emit(&self, event: PlayerEvent) {
        if !self.mounted.load(Ordering::Acquire) {
            trace!(session_key = %self.key, "Session unmounted, dropping event");
            return;
        }
        // No subscribers is not an error for a session.
        let _ = self.bus.emit(CoreEvent::Player(event));
    }

    fn position(&self, position: Duration) {
        self.emit(PlayerEvent::PositionChanged {
            session_key: self.key.clone(),
            position_ms: millis(position),
        });
    }

    fn state(&self, state: PlayerState) {
        self.emit(PlayerEvent::StateChanged {
            session_key: self.key.clone(),
            state,
        });
    }

    fn finished(&self, finish_type: FinishMode) {
        self.emit(PlayerEvent::PlaybackFinished {
            session_key: self.key.clone(),
            finish_type,
        });
    }
}

// ============================================================================
// Session State
// ============================================================================

struct PlayerInner {
    handle: Option<Box<dyn PlaybackHandle>>,
    state: PlayerState,
    finish_mode: FinishMode,
    volume: f32,
    speed: f32,
    update_period: Duration,
}

impl PlayerInner {
    fn set_state(&mut self, state: PlayerState, notifier: &Notifier) {
        if self.state != state {
            debug!(session_key = %notifier.key, from = %self.state, to = %state, "Player state changed");
            self.state = state;
            notifier.state(state);
        }
    }

    fn release_handle(&mut self, holds_track: &AtomicBool) -> Option<Duration> {
        let handle = self.handle.take()?;
        let position = handle.position();
        handle.release();
        holds_track.store(false, Ordering::Release);
        Some(position)
    }

    /// One ticker step: report position or apply the finish mode.
    fn tick(&mut self, notifier: &Notifier, holds_track: &AtomicBool) -> TickControl {
        if self.state != PlayerState::Playing {
            return TickControl::Break;
        }
        let Some(handle) = self.handle.as_ref() else {
            return TickControl::Break;
        };

        if !handle.is_finished() {
            notifier.position(handle.position());
            return TickControl::Continue;
        }

        info!(session_key = %notifier.key, finish_mode = %self.finish_mode, "Track reached its end");

        match self.finish_mode {
            FinishMode::Loop => match handle.seek(Duration::ZERO).and_then(|_| handle.play()) {
                Ok(()) => {
                    notifier.finished(FinishMode::Loop);
                    notifier.position(Duration::ZERO);
                    TickControl::Continue
                }
                Err(e) => {
                    warn!(session_key = %notifier.key, error = %e, "Failed to restart looping track, stopping");
                    self.finish_stopped(notifier, holds_track)
                }
            },
            FinishMode::Pause => {
                if let Err(e) = handle.seek(Duration::ZERO).and_then(|_| handle.pause()) {
                    warn!(session_key = %notifier.key, error = %e, "Failed to rewind finished track");
                }
                notifier.finished(FinishMode::Pause);
                notifier.position(Duration::ZERO);
                self.set_state(PlayerState::Paused, notifier);
                TickControl::Break
            }
            FinishMode::Stop => self.finish_stopped(notifier, holds_track),
        }
    }

    fn finish_stopped(&mut self, notifier: &Notifier, holds_track: &AtomicBool) -> TickControl {
        self.release_handle(holds_track);
        notifier.finished(FinishMode::Stop);
        self.set_state(PlayerState::Stopped, notifier);
        TickControl::Break
    }
}

// ============================================================================
// Player Session
// ============================================================================

/// Playback state machine for one session key.
pub struct PlayerSession {
    key: SessionKey,
    backend: Arc<dyn PlaybackBackend>,
    settings: PlayerSettings,
    inner: Arc<Mutex<PlayerInner>>,
    notifier: Notifier,
    ticker: Ticker,
    holds_track: Arc<AtomicBool>,
}

impl PlayerSession {
    pub fn new(
        key: SessionKey,
        backend: Arc<dyn PlaybackBackend>,
        events: EventBus,
        settings: PlayerSettings,
    ) -> Self {
        let inner = PlayerInner {
            handle: None,
            state: PlayerState::Stopped,
            finish_mode: FinishMode::default(),
            volume: 1.0,
            speed: 1.0,
            update_period: settings.update_intervals.period(UpdateFrequency::default()),
        };

        Self {
            notifier: Notifier {
                key: key.clone(),
                bus: events,
                mounted: Arc::new(AtomicBool::new(true)),
            },
            key,
            backend,
            settings,
            inner: Arc::new(Mutex::new(inner)),
            ticker: Ticker::new("player-position"),
            holds_track: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn key(&self) -> &SessionKey {
        &self.key
    }

    /// `true` while a native track is loaded. Counts against the
    /// concurrency cap.
    pub fn holds_track(&self) -> bool {
        self.holds_track.load(Ordering::Acquire)
    }

    pub fn is_mounted(&self) -> bool {
        self.notifier.mounted.load(Ordering::Acquire)
    }

    /// Stop emitting events for this session. The track stays loaded.
    pub fn mark_unmounted(&self) {
        if self.notifier.mounted.swap(false, Ordering::AcqRel) {
            debug!(session_key = %self.key, "Player marked unmounted");
        }
    }

    pub async fn state(&self) -> PlayerState {
        self.inner.lock().await.state
    }

    pub async fn finish_mode(&self) -> FinishMode {
        self.inner.lock().await.finish_mode
    }

    pub async fn volume(&self) -> f32 {
        self.inner.lock().await.volume
    }

    pub async fn speed(&self) -> f32 {
        self.inner.lock().await.speed
    }

    pub fn is_ticking(&self) -> bool {
        self.ticker.is_running()
    }

    /// Load a track, replacing any previous one. Returns its duration in ms.
    ///
    /// The new track is loaded before the old one is released, so a failed
    /// prepare leaves the session exactly as it was.
    ///
    /// # Errors
    ///
    /// - [`PlaybackError::InvalidArgument`] for an empty path or a volume
    ///   outside `[0, 1]`
    /// - [`PlaybackError::FileNotFound`] when the file does not exist
    /// - [`PlaybackError::Backend`] for any other native failure
    #[instrument(skip(self, request), fields(session_key = %self.key))]
    pub async fn prepare(&self, request: PrepareRequest) -> Result<u64> {
        if request.path.as_os_str().is_empty() {
            return Err(PlaybackError::InvalidArgument("path is empty".to_string()));
        }
        if !valid_volume(request.volume) {
            return Err(PlaybackError::InvalidArgument(format!(
                "volume {} is outside 0.0..=1.0",
                request.volume
            )));
        }

        let speed = self.settings.coerce_speed(Some(request.speed));
        let options = PlaybackOptions::default()
            .with_start_position(Duration::from_millis(request.start_position_ms))
            .with_volume(request.volume)
            .with_speed(speed);

        let mut inner = self.inner.lock().await;

        let handle = self
            .backend
            .load(&request.path, options)
            .await
            .map_err(|e| {
                if e.is_not_found() {
                    let name = request
                        .path
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_default();
                    PlaybackError::FileNotFound(name)
                } else {
                    PlaybackError::Backend(e)
                }
            })?;

        let duration_ms = millis(handle.duration());

        self.ticker.stop();
        if inner.release_handle(&self.holds_track).is_some() {
            debug!("Released previously prepared track");
        }

        inner.handle = Some(handle);
        inner.volume = request.volume;
        inner.speed = speed;
        inner.update_period = self.settings.update_intervals.period(request.frequency);
        self.holds_track.store(true, Ordering::Release);
        inner.set_state(PlayerState::Stopped, &self.notifier);

        info!(duration_ms, "Player prepared");
        Ok(duration_ms)
    }

    /// Start or resume playback. Returns `false` when no track is loaded.
    #[instrument(skip(self), fields(session_key = %self.key))]
    pub async fn start(&self, finish_mode: FinishMode, speed: Option<f32>) -> Result<bool> {
        let mut inner = self.inner.lock().await;
        let speed = self.settings.coerce_speed(speed);

        let Some(handle) = inner.handle.as_ref() else {
            debug!("Start ignored, no track loaded");
            return Ok(false);
        };

        handle.set_speed(speed)?;
        handle.play()?;

        inner.finish_mode = finish_mode;
        inner.speed = speed;
        inner.set_state(PlayerState::Playing, &self.notifier);
        self.start_ticker(inner.update_period);

        Ok(true)
    }

    fn start_ticker(&self, period: Duration) {
        let inner = Arc::clone(&self.inner);
        let notifier = self.notifier.clone();
        let holds_track = Arc::clone(&self.holds_track);

        self.ticker.start(period, move || {
            let inner = Arc::clone(&inner);
            let notifier = notifier.clone();
            let holds_track = Arc::clone(&holds_track);
            async move { inner.lock().await.tick(&notifier, &holds_track) }
        });
    }

    /// Pause a playing session and flush its position.
    #[instrument(skip(self), fields(session_key = %self.key))]
    pub async fn pause(&self) -> Result<bool> {
        let mut inner = self.inner.lock().await;
        if inner.state != PlayerState::Playing {
            return Ok(false);
        }
        let Some(handle) = inner.handle.as_ref() else {
            return Ok(false);
        };

        handle.pause()?;
        self.ticker.stop();
        self.notifier.position(handle.position());
        inner.set_state(PlayerState::Paused, &self.notifier);
        Ok(true)
    }

    /// Stop and release the track. Idempotent.
    #[instrument(skip(self), fields(session_key = %self.key))]
    pub async fn stop(&self) -> bool {
        let mut inner = self.inner.lock().await;
        self.ticker.stop();

        if let Some(position) = inner.release_handle(&self.holds_track) {
            self.notifier.position(position);
            debug!("Track released");
        }
        inner.set_state(PlayerState::Stopped, &self.notifier);
        true
    }

    /// Seek to `position_ms`, clamped to the track duration.
    ///
    /// Returns `false` without touching the track when the value is negative
    /// or not finite, or no track is loaded.
    #[instrument(skip(self), fields(session_key = %self.key))]
    pub async fn seek(&self, position_ms: f64) -> Result<bool> {
        if !position_ms.is_finite() || position_ms < 0.0 {
            return Ok(false);
        }

        let inner = self.inner.lock().await;
        let Some(handle) = inner.handle.as_ref() else {
            return Ok(false);
        };

        let target = Duration::from_secs_f64(position_ms / 1000.0).min(handle.duration());
        handle.seek(target)?;
        trace!(position_ms = millis(target), "Seeked");
        Ok(true)
    }

    /// Set the volume. Returns `false` for values outside `[0, 1]` or when
    /// no track is loaded.
    #[instrument(skip(self), fields(session_key = %self.key))]
    pub async fn set_volume(&self, volume: f32) -> Result<bool> {
        if !valid_volume(volume) {
            return Ok(false);
        }

        let mut inner = self.inner.lock().await;
        let Some(handle) = inner.handle.as_ref() else {
            return Ok(false);
        };

        handle.set_volume(volume)?;
        inner.volume = volume;
        Ok(true)
    }

    /// Change speed. Invalid values become 1.0; large values are clamped.
    #[instrument(skip(self), fields(session_key = %self.key))]
    pub async fn set_speed(&self, speed: f32) -> Result<bool> {
        let speed = self.settings.coerce_speed(Some(speed));

        let mut inner = self.inner.lock().await;
        let Some(handle) = inner.handle.as_ref() else {
            return Ok(false);
        };

        handle.set_speed(speed)?;
        inner.speed = speed;
        Ok(true)
    }

    /// Current position or total length in ms, `None` when no track is
    /// loaded.
    pub async fn get_duration(&self, kind: DurationType) -> Option<u64> {
        let inner = self.inner.lock().await;
        let handle = inner.handle.as_ref()?;
        Some(match kind {
            DurationType::Current => millis(handle.position()),
            DurationType::Max => millis(handle.duration()),
        })
    }
}

impl std::fmt::Debug for PlayerSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlayerSession")
            .field("key", &self.key)
            .field("holds_track", &self.holds_track())
            .field("mounted", &self.is_mounted())
            .field("ticker", &self.ticker)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn speed_coercion() {
        let settings = PlayerSettings::default();
        assert_eq!(settings.coerce_speed(None), 1.0);
        assert_eq!(settings.coerce_speed(Some(0.0)), 1.0);
        assert_eq!(settings.coerce_speed(Some(-2.0)), 1.0);
        assert_eq!(settings.coerce_speed(Some(f32::NAN)), 1.0);
        assert_eq!(settings.coerce_speed(Some(1.5)), 1.5);
        assert_eq!(settings.coerce_speed(Some(8.0)), 2.0);
    }

    #[test]
    fn volume_bounds() {
        assert!(valid_volume(0.0));
        assert!(valid_volume(1.0));
        assert!(!valid_volume(1.01));
        assert!(!valid_volume(-0.1));
        assert!(!valid_volume(f32::INFINITY));
    }

    #[test]
    fn prepare_request_defaults() {
        let request = PrepareRequest::new("/tmp/a.wav");
        assert_eq!(request.volume, 1.0);
        assert_eq!(request.speed, 1.0);
        assert_eq!(request.frequency, UpdateFrequency::Medium);
        assert_eq!(request.start_position_ms, 0);
    }
}
