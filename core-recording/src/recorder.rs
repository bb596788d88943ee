//! # Recorder
//!
//! The engine's single recording session.
//!
//! ## State Machine
//!
//! ```text
//!             start              pause
//!   Stopped ────────► Recording ───────► Paused
//!      ▲                 │  ▲              │
//!      │            stop │  └── resume ────┘
//!      └─────────────────┴──────── stop ───┘
//! ```
//!
//! While recording, an amplitude ticker reads the encoder's peak meter at
//! the requested [`UpdateFrequency`] and emits [`RecorderEvent::Amplitude`].
//! The ticker stops on pause and restarts on resume.
//!
//! `stop` refuses to finalize a clip shorter than the configured minimum
//! (paused time excluded); the recording keeps running in that case.

use crate::error::{RecordingError, Result};
use crate::meter::meter_value;
use crate::naming::auto_file_name;
use bridge_traits::error::BridgeError;
use bridge_traits::recording::{
    AudioEncoder, DurationProbe, EncoderConfig, OutputFormat, RecorderBackend, RecordingHandle,
};
use bridge_traits::storage::PathAllocator;
use bridge_traits::time::Clock;
use core_runtime::config::{EngineConfig, RecordingDefaults, UpdateIntervals};
use core_runtime::events::{CoreEvent, EventBus, RecorderEvent};
use core_runtime::logging::strip_path;
use core_runtime::session::{RecorderState, UpdateFrequency};
use core_runtime::ticker::{TickControl, Ticker};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

// ============================================================================
// Settings & Requests
// ============================================================================

/// Engine-wide knobs the recorder needs.
#[derive(Debug, Clone, PartialEq)]
pub struct RecorderSettings {
    pub update_intervals: UpdateIntervals,
    /// Shorter clips are rejected on stop.
    pub min_duration: Duration,
    pub defaults: RecordingDefaults,
}

impl Default for RecorderSettings {
    fn default() -> Self {
        Self::from(&EngineConfig::default())
    }
}

impl From<&EngineConfig> for RecorderSettings {
    fn from(config: &EngineConfig) -> Self {
        Self {
            update_intervals: config.update_intervals,
            min_duration: config.min_recording_duration,
            defaults: config.recording.clone(),
        }
    }
}

/// Arguments of [`Recorder::start`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordingRequest {
    /// Output file. Auto-named in the recordings directory when `None`.
    pub path: Option<PathBuf>,
    pub encoder: EncoderConfig,
    /// Amplitude tick rate. Default: [`UpdateFrequency::Medium`]
    pub frequency: UpdateFrequency,
    /// Report decibels instead of a linear peak.
    pub legacy_mode: bool,
}

impl Default for RecordingRequest {
    fn default() -> Self {
        Self {
            path: None,
            encoder: EncoderConfig::default(),
            frequency: UpdateFrequency::default(),
            legacy_mode: false,
        }
    }
}

impl RecordingRequest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request seeded with the engine's default sample and bit rates.
    pub fn from_defaults(defaults: &RecordingDefaults) -> Self {
        let mut request = Self::default();
        request.encoder.sample_rate = defaults.sample_rate;
        request.encoder.bit_rate = defaults.bit_rate;
        request
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_encoder(mut self, encoder: AudioEncoder) -> Self {
        self.encoder.encoder = encoder;
        self
    }

    /// Select the encoder by host code. Unknown codes fall back to AAC.
    pub fn with_encoder_code(self, code: u8) -> Self {
        let encoder = AudioEncoder::from_code(code).unwrap_or_else(|| {
            debug!(code, "Unknown encoder code, using AAC");
            AudioEncoder::Aac
        });
        self.with_encoder(encoder)
    }

    pub fn with_output_format(mut self, format: OutputFormat) -> Self {
        self.encoder.output_format = format;
        self
    }

    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.encoder.sample_rate = sample_rate;
        self
    }

    pub fn with_bit_rate(mut self, bit_rate: u32) -> Self {
        self.encoder.bit_rate = bit_rate;
        self
    }

    pub fn with_frequency(mut self, frequency: UpdateFrequency) -> Self {
        self.frequency = frequency;
        self
    }

    pub fn with_legacy_mode(mut self, legacy_mode: bool) -> Self {
        self.legacy_mode = legacy_mode;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.path.as_ref().is_some_and(|p| p.as_os_str().is_empty()) {
            return Err(RecordingError::Validation("path is empty".to_string()));
        }
        if self.encoder.sample_rate == 0 {
            return Err(RecordingError::Validation(
                "sample rate must be greater than 0".to_string(),
            ));
        }
        if self.encoder.bit_rate == 0 {
            return Err(RecordingError::Validation(
                "bit rate must be greater than 0".to_string(),
            ));
        }
        if self.encoder.channels == 0 {
            return Err(RecordingError::Validation(
                "channel count must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// A finalized recording.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordingResult {
    pub path: PathBuf,
    /// Probed from the file, `-1` when the container could not be read.
    pub duration_ms: i64,
}

// ============================================================================
// Recorded Time
// ============================================================================

/// Wall time spent recording, excluding pauses.
#[derive(Debug, Clone, Copy)]
struct RecordedTime {
    started: Instant,
    paused_since: Option<Instant>,
    paused_total: Duration,
}

impl RecordedTime {
    fn start(now: Instant) -> Self {
        Self {
            started: now,
            paused_since: None,
            paused_total: Duration::ZERO,
        }
    }

    fn pause(&mut self, now: Instant) {
        self.paused_since.get_or_insert(now);
    }

    fn resume(&mut self, now: Instant) {
        if let Some(since) = self.paused_since.take() {
            self.paused_total += now.saturating_duration_since(since);
        }
    }

    fn elapsed(&self, now: Instant) -> Duration {
        let paused = self.paused_total
            + self
                .paused_since
                .map_or(Duration::ZERO, |since| now.saturating_duration_since(since));
        now.saturating_duration_since(self.started)
            .saturating_sub(paused)
    }
}

// ============================================================================
// Recorder State
// ============================================================================

struct ActiveRecording {
    handle: Box<dyn RecordingHandle>,
    path: PathBuf,
    legacy_mode: bool,
    update_period: Duration,
    time: RecordedTime,
}

struct RecorderInner {
    state: RecorderState,
    active: Option<ActiveRecording>,
}

fn emit(bus: &EventBus, event: RecorderEvent) {
    // No subscribers is not an error for the recorder.
    let _ = bus.emit(CoreEvent::Recorder(event));
}

/// Finalize and drop an encoder on the blocking pool.
///
/// Native encoders flush and join their capture thread here.
async fn finish_handle(handle: Box<dyn RecordingHandle>) -> Result<()> {
    let finished = tokio::task::spawn_blocking(move || handle.finish())
        .await
        .map_err(|e| BridgeError::OperationFailed(format!("finalize task failed: {e}")))?;
    Ok(finished?)
}

/// File name only; directories may contain user names.
fn file_label(path: &Path) -> String {
    strip_path(&path.to_string_lossy()).to_string()
}

fn path_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Platform collaborators of the recorder.
#[derive(Clone)]
pub struct RecorderBridges {
    pub backend: Arc<dyn RecorderBackend>,
    pub paths: Arc<dyn PathAllocator>,
    pub probe: Arc<dyn DurationProbe>,
    pub clock: Arc<dyn Clock>,
}

// ============================================================================
// Recorder
// ============================================================================

/// Single-instance recording state machine.
pub struct Recorder {
    bridges: RecorderBridges,
    events: EventBus,
    settings: RecorderSettings,
    inner: Arc<Mutex<RecorderInner>>,
    ticker: Ticker,
}

impl Recorder {
    pub fn new(bridges: RecorderBridges, events: EventBus, settings: RecorderSettings) -> Self {
        Self {
            bridges,
            events,
            settings,
            inner: Arc::new(Mutex::new(RecorderInner {
                state: RecorderState::Stopped,
                active: None,
            })),
            ticker: Ticker::new("recorder-amplitude"),
        }
    }

    pub fn settings(&self) -> &RecorderSettings {
        &self.settings
    }

    pub async fn state(&self) -> RecorderState {
        self.inner.lock().await.state
    }

    /// Path of the running recording, if any.
    pub async fn current_path(&self) -> Option<PathBuf> {
        self.inner
            .lock()
            .await
            .active
            .as_ref()
            .map(|active| active.path.clone())
    }

    pub fn is_metering(&self) -> bool {
        self.ticker.is_running()
    }

    /// Begin a new recording.
    ///
    /// # Errors
    ///
    /// - [`RecordingError::AlreadyActive`] while recording or paused
    /// - [`RecordingError::Validation`] for unusable request fields
    /// - [`RecordingError::Platform`] when no path or encoder can be allocated
    #[instrument(skip(self, request))]
    pub async fn start(&self, mut request: RecordingRequest) -> Result<bool> {
        request.validate()?;
        request.encoder.output_format = self
            .bridges
            .backend
            .output_format(request.encoder.output_format);

        let mut inner = self.inner.lock().await;
        if inner.state.is_active() {
            return Err(RecordingError::AlreadyActive);
        }

        let path = match request.path {
            Some(path) => path,
            None => {
                let name = auto_file_name(
                    self.bridges.clock.as_ref(),
                    &self.settings.defaults.file_name_format,
                    request.encoder.output_format,
                )?;
                self.bridges.paths.allocate(&name).await?
            }
        };

        let handle = self.bridges.backend.start(&path, &request.encoder).await?;
        let update_period = self.settings.update_intervals.period(request.frequency);

        inner.active = Some(ActiveRecording {
            handle,
            path: path.clone(),
            legacy_mode: request.legacy_mode,
            update_period,
            time: RecordedTime::start(Instant::now()),
        });
        inner.state = RecorderState::Recording;

        emit(
            &self.events,
            RecorderEvent::Started {
                path: path_string(&path),
            },
        );
        self.start_ticker(update_period);

        info!(
            file = %file_label(&path),
            encoder = ?request.encoder.encoder,
            sample_rate = request.encoder.sample_rate,
            "Recording started"
        );
        Ok(true)
    }

    fn start_ticker(&self, period: Duration) {
        let inner = Arc::clone(&self.inner);
        let events = self.events.clone();

        self.ticker.start(period, move || {
            let inner = Arc::clone(&inner);
            let events = events.clone();
            async move {
                let inner = inner.lock().await;
                if inner.state != RecorderState::Recording {
                    return TickControl::Break;
                }
                let Some(active) = inner.active.as_ref() else {
                    return TickControl::Break;
                };
                let decibel = meter_value(active.handle.amplitude(), active.legacy_mode);
                emit(&events, RecorderEvent::Amplitude { decibel });
                TickControl::Continue
            }
        });
    }

    /// Pause the running recording. Returns `false` unless recording.
    ///
    /// # Errors
    ///
    /// [`RecordingError::PauseNotSupported`] when the encoder cannot pause;
    /// the recording continues unchanged.
    #[instrument(skip(self))]
    pub async fn pause(&self) -> Result<bool> {
        let mut inner = self.inner.lock().await;
        if inner.state != RecorderState::Recording {
            return Ok(false);
        }
        let Some(active) = inner.active.as_mut() else {
            return Ok(false);
        };
        if !active.handle.supports_pause() {
            return Err(RecordingError::PauseNotSupported);
        }

        active.handle.pause()?;
        active.time.pause(Instant::now());
        self.ticker.stop();
        inner.state = RecorderState::Paused;

        emit(&self.events, RecorderEvent::Paused);
        debug!("Recording paused");
        Ok(true)
    }

    /// Resume a paused recording. Returns `false` unless paused.
    #[instrument(skip(self))]
    pub async fn resume(&self) -> Result<bool> {
        let mut inner = self.inner.lock().await;
        if inner.state != RecorderState::Paused {
            return Ok(false);
        }
        let Some(active) = inner.active.as_mut() else {
            return Ok(false);
        };
        if !active.handle.supports_pause() {
            return Err(RecordingError::PauseNotSupported);
        }

        active.handle.resume()?;
        active.time.resume(Instant::now());
        let period = active.update_period;
        inner.state = RecorderState::Recording;

        emit(&self.events, RecorderEvent::Resumed);
        self.start_ticker(period);
        debug!("Recording resumed");
        Ok(true)
    }

    /// Finalize the recording. Returns `None` when nothing is recording.
    ///
    /// # Errors
    ///
    /// - [`RecordingError::ShortRecording`] when less than the minimum
    ///   duration was recorded; nothing changes
    /// - [`RecordingError::Platform`] when the encoder fails to finalize;
    ///   the recorder is released and returns to `Stopped`
    #[instrument(skip(self))]
    pub async fn stop(&self) -> Result<Option<RecordingResult>> {
        let mut inner = self.inner.lock().await;
        let Some(active) = inner.active.as_ref() else {
            return Ok(None);
        };

        let elapsed = active.time.elapsed(Instant::now());
        if elapsed < self.settings.min_duration {
            warn!(
                elapsed_ms = elapsed.as_millis() as u64,
                "Stop rejected, recording too short"
            );
            return Err(RecordingError::ShortRecording {
                elapsed_ms: elapsed.as_millis() as u64,
                min_ms: self.settings.min_duration.as_millis() as u64,
            });
        }

        self.ticker.stop();
        inner.state = RecorderState::Stopped;
        let Some(active) = inner.active.take() else {
            return Ok(None);
        };
        drop(inner);

        let ActiveRecording { handle, path, .. } = active;
        finish_handle(handle).await?;

        let duration_ms = match self.bridges.probe.probe_duration(&path).await {
            Ok(duration) => duration.as_millis().min(i64::MAX as u128) as i64,
            Err(e) => {
                warn!(file = %file_label(&path), error = %e, "Failed to probe recording duration");
                -1
            }
        };

        emit(
            &self.events,
            RecorderEvent::Stopped {
                path: path_string(&path),
                duration_ms,
            },
        );
        info!(file = %file_label(&path), duration_ms, "Recording stopped");

        Ok(Some(RecordingResult { path, duration_ms }))
    }

    /// On-demand meter read. `None` unless a recording is active.
    pub async fn get_decibel(&self) -> Option<f32> {
        let inner = self.inner.lock().await;
        let active = inner.active.as_ref()?;
        Some(meter_value(active.handle.amplitude(), active.legacy_mode))
    }

    /// Abandon any active recording without the duration guard.
    ///
    /// Used on engine shutdown; the file is finalized when possible.
    pub async fn release(&self) {
        let active = {
            let mut inner = self.inner.lock().await;
            self.ticker.stop();
            inner.state = RecorderState::Stopped;
            inner.active.take()
        };
        if let Some(ActiveRecording { handle, path, .. }) = active {
            if let Err(e) = finish_handle(handle).await {
                warn!(error = %e, "Failed to finalize released recording");
            }
            debug!(file = %file_label(&path), "Recorder released");
        }
    }
}

impl std::fmt::Debug for Recorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Recorder")
            .field("settings", &self.settings)
            .field("ticker", &self.ticker)
            .finish()
    }
}
