//! # Waveform Engine
//!
//! Host-facing façade: owns the session registry, the recorder, the event
//! bus and the platform bridges, and exposes every keyed operation.
//!
//! ## Usage
//!
//! ```ignore
//! let engine = WaveformEngine::new(EngineConfig::default(), deps)?;
//! let mut events = engine.subscribe();
//!
//! let duration_ms = engine
//!     .prepare_player("a", PrepareRequest::new("/music/a.m4a"))
//!     .await?;
//! engine.start_player("a", FinishMode::Stop, None).await?;
//!
//! let outcome = engine.extract_waveform("a", "/music/a.m4a", 100).await?;
//! ```

use crate::error::{CoreError, Result};
use crate::registry::SessionRegistry;
use bridge_traits::playback::{DecoderProvider, PlaybackBackend};
use bridge_traits::recording::{DurationProbe, RecorderBackend};
use bridge_traits::storage::PathAllocator;
use bridge_traits::time::{Clock, SystemClock};
use core_playback::{PlayerSession, PlayerSettings, PrepareRequest, SymphoniaDecoderProvider};
use core_recording::{
    LoftyDurationProbe, Recorder, RecorderBridges, RecorderSettings, RecordingRequest,
    RecordingResult,
};
use core_runtime::config::EngineConfig;
use core_runtime::events::{EventBus, EventStream};
use core_runtime::session::{DurationType, FinishMode, RecorderState, SessionKey};
use core_waveform::{ExtractionOutcome, ExtractorSettings, WaveformExtractor};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, instrument};

// ============================================================================
// Dependencies
// ============================================================================

/// Platform bridges the engine is built from.
///
/// Playback, recording and path allocation have no portable default and
/// must be supplied. Decoding, duration probing and the clock default to
/// the portable implementations.
#[derive(Clone)]
pub struct EngineDependencies {
    pub playback: Option<Arc<dyn PlaybackBackend>>,
    pub recorder: Option<Arc<dyn RecorderBackend>>,
    pub paths: Option<Arc<dyn PathAllocator>>,
    pub decoders: Arc<dyn DecoderProvider>,
    pub duration_probe: Arc<dyn DurationProbe>,
    pub clock: Arc<dyn Clock>,
}

impl Default for EngineDependencies {
    fn default() -> Self {
        Self {
            playback: None,
            recorder: None,
            paths: None,
            decoders: Arc::new(SymphoniaDecoderProvider::new()),
            duration_probe: Arc::new(LoftyDurationProbe::new()),
            clock: Arc::new(SystemClock),
        }
    }
}

impl EngineDependencies {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_playback(mut self, playback: Arc<dyn PlaybackBackend>) -> Self {
        self.playback = Some(playback);
        self
    }

    pub fn with_recorder(mut self, recorder: Arc<dyn RecorderBackend>) -> Self {
        self.recorder = Some(recorder);
        self
    }

    pub fn with_paths(mut self, paths: Arc<dyn PathAllocator>) -> Self {
        self.paths = Some(paths);
        self
    }

    pub fn with_decoders(mut self, decoders: Arc<dyn DecoderProvider>) -> Self {
        self.decoders = decoders;
        self
    }

    pub fn with_duration_probe(mut self, probe: Arc<dyn DurationProbe>) -> Self {
        self.duration_probe = probe;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}

fn require<T: ?Sized>(bridge: Option<Arc<T>>, capability: &str) -> Result<Arc<T>> {
    bridge.ok_or_else(|| CoreError::CapabilityMissing {
        capability: capability.to_string(),
        message: format!("No {capability} implementation was provided"),
    })
}

// ============================================================================
// Engine
// ============================================================================

pub struct WaveformEngine {
    config: EngineConfig,
    events: EventBus,
    registry: SessionRegistry,
    recorder: Recorder,
    playback: Arc<dyn PlaybackBackend>,
    decoders: Arc<dyn DecoderProvider>,
    player_settings: PlayerSettings,
    extractor_settings: ExtractorSettings,
}

impl WaveformEngine {
    /// Build an engine.
    ///
    /// # Errors
    ///
    /// - [`CoreError::Runtime`] when `config` fails validation
    /// - [`CoreError::CapabilityMissing`] for a missing required bridge
    pub fn new(config: EngineConfig, deps: EngineDependencies) -> Result<Self> {
        config.validate()?;

        let playback = require(deps.playback, "PlaybackBackend")?;
        let recorder_backend = require(deps.recorder, "RecorderBackend")?;
        let paths = require(deps.paths, "PathAllocator")?;

        let events = EventBus::new(config.event_buffer_size);
        let recorder = Recorder::new(
            RecorderBridges {
                backend: recorder_backend,
                paths,
                probe: deps.duration_probe,
                clock: deps.clock,
            },
            events.clone(),
            RecorderSettings::from(&config),
        );

        info!(
            max_players = config.max_concurrent_players,
            "Waveform engine initialized"
        );

        Ok(Self {
            registry: SessionRegistry::new(config.max_concurrent_players),
            player_settings: PlayerSettings::from(&config),
            extractor_settings: ExtractorSettings::from(&config),
            recorder,
            playback,
            decoders: deps.decoders,
            events,
            config,
        })
    }

    /// Engine wired to the desktop bridges (rodio, cpal, dirs).
    #[cfg(all(feature = "desktop-shims", not(target_arch = "wasm32")))]
    pub fn desktop(config: EngineConfig) -> Result<Self> {
        let deps = EngineDependencies::new()
            .with_playback(Arc::new(bridge_desktop::RodioPlaybackBackend::new()?))
            .with_recorder(Arc::new(bridge_desktop::CpalRecorderBackend::new()))
            .with_paths(Arc::new(bridge_desktop::DesktopPathAllocator::new()));
        Self::new(config, deps)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn subscribe(&self) -> EventStream {
        EventStream::new(self.events.subscribe())
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    fn new_player(&self, key: &SessionKey) -> PlayerSession {
        PlayerSession::new(
            key.clone(),
            Arc::clone(&self.playback),
            self.events.clone(),
            self.player_settings,
        )
    }

    fn player(&self, key: &str) -> Result<Option<Arc<PlayerSession>>> {
        let key = SessionKey::new(key)?;
        Ok(self.registry.player(&key))
    }

    // ========================================================================
    // Players
    // ========================================================================

    /// Create the session for `key` if it does not exist yet.
    pub fn init_player(&self, key: &str) -> Result<()> {
        let key = SessionKey::new(key)?;
        self.registry.get_or_insert_player(&key, || self.new_player(&key));
        Ok(())
    }

    /// Load a track into `key`'s session. Returns the duration in ms.
    ///
    /// # Errors
    ///
    /// - [`CoreError::Capacity`] when the player cap is reached; nothing is
    ///   created or changed
    /// - [`CoreError::Playback`] when the track cannot be loaded; the session
    ///   keeps its previous track
    #[instrument(skip(self, request))]
    pub async fn prepare_player(&self, key: &str, request: PrepareRequest) -> Result<u64> {
        let key = SessionKey::new(key)?;
        let _slot = self.registry.reserve_slot(&key)?;
        let session = self
            .registry
            .get_or_insert_player(&key, || self.new_player(&key));

        Ok(session.prepare(request).await?)
    }

    /// # Errors
    ///
    /// [`CoreError::SessionNotFound`] for an unknown key.
    #[instrument(skip(self))]
    pub async fn start_player(
        &self,
        key: &str,
        finish_mode: FinishMode,
        speed: Option<f32>,
    ) -> Result<bool> {
        let session = self
            .player(key)?
            .ok_or_else(|| CoreError::SessionNotFound(key.to_string()))?;
        Ok(session.start(finish_mode, speed).await?)
    }

    pub async fn pause_player(&self, key: &str) -> Result<bool> {
        match self.player(key)? {
            Some(session) => Ok(session.pause().await?),
            None => Ok(false),
        }
    }

    /// Stop `key`'s session, release its track and forget it.
    ///
    /// Idempotent: an unknown or already stopped key also reports `true`.
    #[instrument(skip(self))]
    pub async fn stop_player(&self, key: &str) -> Result<bool> {
        let key = SessionKey::new(key)?;
        match self.registry.remove_player(&key) {
            Some(session) => Ok(session.stop().await),
            None => {
                debug!(session_key = %key, "Stop on a session that is already gone");
                Ok(true)
            }
        }
    }

    pub async fn seek_to(&self, key: &str, position_ms: f64) -> Result<bool> {
        match self.player(key)? {
            Some(session) => Ok(session.seek(position_ms).await?),
            None => Ok(false),
        }
    }

    pub async fn set_volume(&self, key: &str, volume: f32) -> Result<bool> {
        match self.player(key)? {
            Some(session) => Ok(session.set_volume(volume).await?),
            None => Ok(false),
        }
    }

    pub async fn set_playback_speed(&self, key: &str, speed: f32) -> Result<bool> {
        match self.player(key)? {
            Some(session) => Ok(session.set_speed(speed).await?),
            None => Ok(false),
        }
    }

    /// Position or length in ms; `None` for an unknown key or no track.
    pub async fn get_duration(&self, key: &str, kind: DurationType) -> Result<Option<u64>> {
        match self.player(key)? {
            Some(session) => Ok(session.get_duration(kind).await),
            None => Ok(None),
        }
    }

    /// Stop and forget every player. Returns how many were stopped.
    #[instrument(skip(self))]
    pub async fn stop_all_players(&self) -> usize {
        let sessions = self.registry.drain_players();
        for session in &sessions {
            session.stop().await;
        }
        debug!(count = sessions.len(), "All players stopped");
        sessions.len()
    }

    /// Silence every session's events without releasing tracks.
    pub fn mark_all_unmounted(&self) {
        self.registry.mark_all_unmounted();
    }

    pub fn mark_player_unmounted(&self, key: &str) -> Result<bool> {
        let key = SessionKey::new(key)?;
        Ok(self.registry.mark_player_unmounted(&key))
    }

    // ========================================================================
    // Extraction
    // ========================================================================

    /// Extract `expected_points` normalized buckets from `path`.
    ///
    /// A running extraction under the same key is stopped first. A forced
    /// stop resolves with [`ExtractionOutcome::Stopped`].
    #[instrument(skip(self, path))]
    pub async fn extract_waveform(
        &self,
        key: &str,
        path: impl AsRef<Path>,
        expected_points: usize,
    ) -> Result<ExtractionOutcome> {
        let key = SessionKey::new(key)?;
        let extractor = Arc::new(WaveformExtractor::new(
            key,
            Arc::clone(&self.decoders),
            self.events.clone(),
            self.extractor_settings,
        ));

        self.registry.insert_extractor(Arc::clone(&extractor));
        let outcome = extractor.extract(path.as_ref(), expected_points).await;
        self.registry.finish_extractor(&extractor);

        Ok(outcome?)
    }

    /// Force-stop the extraction running under `key`.
    pub fn stop_extraction(&self, key: &str) -> Result<bool> {
        let key = SessionKey::new(key)?;
        Ok(match self.registry.take_extractor(&key) {
            Some(extractor) => {
                extractor.force_stop();
                true
            }
            None => false,
        })
    }

    /// Force-stop every running extraction. Returns how many were stopped.
    pub fn stop_all_extractors(&self) -> usize {
        let extractors = self.registry.drain_extractors();
        for extractor in &extractors {
            extractor.force_stop();
        }
        debug!(count = extractors.len(), "All extractors stopped");
        extractors.len()
    }

    // ========================================================================
    // Recording
    // ========================================================================

    /// Request seeded with the configured default rates.
    pub fn recording_request(&self) -> RecordingRequest {
        RecordingRequest::from_defaults(&self.config.recording)
    }

    pub async fn start_recording(&self, request: RecordingRequest) -> Result<bool> {
        Ok(self.recorder.start(request).await?)
    }

    pub async fn pause_recording(&self) -> Result<bool> {
        Ok(self.recorder.pause().await?)
    }

    pub async fn resume_recording(&self) -> Result<bool> {
        Ok(self.recorder.resume().await?)
    }

    /// Finalize the recording. `None` when nothing was recording.
    pub async fn stop_recording(&self) -> Result<Option<RecordingResult>> {
        Ok(self.recorder.stop().await?)
    }

    pub async fn get_decibel(&self) -> Option<f32> {
        self.recorder.get_decibel().await
    }

    pub async fn recorder_state(&self) -> RecorderState {
        self.recorder.state().await
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Stop every player and extraction and release the recorder.
    #[instrument(skip(self))]
    pub async fn shutdown(&self) {
        let players = self.stop_all_players().await;
        let extractors = self.stop_all_extractors();
        self.recorder.release().await;
        info!(players, extractors, "Waveform engine shut down");
    }
}

impl std::fmt::Debug for WaveformEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WaveformEngine")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .field("recorder", &self.recorder)
            .finish_non_exhaustive()
    }
}
