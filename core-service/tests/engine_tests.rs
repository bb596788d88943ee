//! End-to-end engine tests with fake platform bridges.

use async_trait::async_trait;
use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bridge_traits::playback::{
    AudioCodec, AudioDecoder, AudioFormat, AudioFrameChunk, AudioSource, DecoderProvider,
    PlaybackBackend, PlaybackHandle, PlaybackOptions, ProbeResult,
};
use bridge_traits::recording::{
    AmplitudeSample, DurationProbe, EncoderConfig, RecorderBackend, RecordingHandle,
};
use bridge_traits::storage::PathAllocator;
use core_runtime::events::{CoreEvent, PlayerEvent};
use core_runtime::session::{RecorderState, SessionKey};
use core_service::{
    CoreError, DurationType, EngineConfig, EngineDependencies, ErrorKind, EventStream,
    ExtractionOutcome, FinishMode, PrepareRequest, WaveformEngine,
};
use mockall::mock;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

// ============================================================================
// Playback fake: position follows (paused) tokio time while playing
// ============================================================================

#[derive(Debug)]
struct Clocked {
    offset: Duration,
    playing_since: Option<Instant>,
    released: bool,
}

struct ClockedHandle {
    duration: Duration,
    state: Mutex<Clocked>,
}

impl ClockedHandle {
    fn raw_position(&self, state: &Clocked) -> Duration {
        let running = state
            .playing_since
            .map_or(Duration::ZERO, |since| since.elapsed());
        (state.offset + running).min(self.duration)
    }
}

impl PlaybackHandle for ClockedHandle {
    fn duration(&self) -> Duration {
        self.duration
    }

    fn position(&self) -> Duration {
        self.raw_position(&self.state.lock())
    }

    fn play(&self) -> BridgeResult<()> {
        let mut state = self.state.lock();
        state.playing_since.get_or_insert_with(Instant::now);
        Ok(())
    }

    fn pause(&self) -> BridgeResult<()> {
        let mut state = self.state.lock();
        state.offset = self.raw_position(&state);
        state.playing_since = None;
        Ok(())
    }

    fn seek(&self, position: Duration) -> BridgeResult<()> {
        let mut state = self.state.lock();
        state.offset = position;
        if state.playing_since.is_some() {
            state.playing_since = Some(Instant::now());
        }
        Ok(())
    }

    fn set_volume(&self, _volume: f32) -> BridgeResult<()> {
        Ok(())
    }

    fn set_speed(&self, _speed: f32) -> BridgeResult<()> {
        Ok(())
    }

    fn is_finished(&self) -> bool {
        let state = self.state.lock();
        !state.released && self.raw_position(&state) >= self.duration
    }

    fn release(&self) {
        self.state.lock().released = true;
    }
}

struct ClockedBackend {
    duration: Duration,
}

#[async_trait]
impl PlaybackBackend for ClockedBackend {
    async fn load(&self, path: &Path, options: PlaybackOptions) -> BridgeResult<Box<dyn PlaybackHandle>> {
        if path.starts_with("/missing") {
            return Err(BridgeError::NotFound(path.display().to_string()));
        }
        Ok(Box::new(ClockedHandle {
            duration: self.duration,
            state: Mutex::new(Clocked {
                offset: options.start_position,
                playing_since: None,
                released: false,
            }),
        }))
    }
}

// ============================================================================
// Recording fakes
// ============================================================================

struct SilentHandle;

impl RecordingHandle for SilentHandle {
    fn supports_pause(&self) -> bool {
        true
    }

    fn pause(&self) -> BridgeResult<()> {
        Ok(())
    }

    fn resume(&self) -> BridgeResult<()> {
        Ok(())
    }

    fn amplitude(&self) -> AmplitudeSample {
        AmplitudeSample::silent(1.0)
    }

    fn finish(&self) -> BridgeResult<()> {
        Ok(())
    }
}

struct SilentRecorder;

#[async_trait]
impl RecorderBackend for SilentRecorder {
    async fn start(&self, _path: &Path, _config: &EncoderConfig) -> BridgeResult<Box<dyn RecordingHandle>> {
        Ok(Box::new(SilentHandle))
    }
}

struct TempPaths;

#[async_trait]
impl PathAllocator for TempPaths {
    async fn recordings_directory(&self) -> BridgeResult<PathBuf> {
        Ok(std::env::temp_dir())
    }
}

mock! {
    Probe {}

    #[async_trait]
    impl DurationProbe for Probe {
        async fn probe_duration(&self, path: &Path) -> BridgeResult<Duration>;
    }
}

fn two_second_probe() -> MockProbe {
    let mut probe = MockProbe::new();
    probe
        .expect_probe_duration()
        .returning(|_| Ok(Duration::from_millis(2_000)));
    probe
}

// ============================================================================
// Stalling decoder: one chunk, then never returns
// ============================================================================

struct StallingDecoder {
    sent: bool,
}

#[async_trait]
impl AudioDecoder for StallingDecoder {
    async fn probe(&mut self) -> BridgeResult<ProbeResult> {
        let format = AudioFormat::new(AudioCodec::Wav, 1_000, 1, Some(16));
        Ok(ProbeResult::new(format).with_total_frames(Some(10_000)))
    }

    async fn decode_frames(&mut self, _max_frames: usize) -> BridgeResult<Option<AudioFrameChunk>> {
        if !self.sent {
            self.sent = true;
            return Ok(Some(AudioFrameChunk::new(vec![0.3; 2_000], 1, Duration::ZERO)));
        }
        std::future::pending::<()>().await;
        Ok(None)
    }
}

struct StallingProvider;

#[async_trait]
impl DecoderProvider for StallingProvider {
    async fn open(&self, _source: &AudioSource) -> BridgeResult<Box<dyn AudioDecoder>> {
        Ok(Box::new(StallingDecoder { sent: false }))
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn deps(track: Duration) -> EngineDependencies {
    EngineDependencies::new()
        .with_playback(Arc::new(ClockedBackend { duration: track }))
        .with_recorder(Arc::new(SilentRecorder))
        .with_paths(Arc::new(TempPaths))
        .with_duration_probe(Arc::new(two_second_probe()))
}

fn key(name: &str) -> SessionKey {
    SessionKey::new(name).unwrap()
}

fn engine(track: Duration) -> WaveformEngine {
    let config = EngineConfig::builder()
        .event_buffer_size(1_024)
        .build()
        .unwrap();
    WaveformEngine::new(config, deps(track)).unwrap()
}

fn finished(stream: &mut EventStream) -> Vec<(String, FinishMode)> {
    stream
        .drain()
        .into_iter()
        .filter_map(|event| match event {
            CoreEvent::Player(PlayerEvent::PlaybackFinished {
                session_key,
                finish_type,
            }) => Some((session_key.to_string(), finish_type)),
            _ => None,
        })
        .collect()
}

fn write_wav(seconds: u32) -> PathBuf {
    let path = std::env::temp_dir().join(format!("core-service-{}.wav", uuid::Uuid::new_v4()));
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 8_000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(&path, spec).unwrap();
    for n in 0..seconds * 8_000 {
        let value = ((n as f32 / 8_000.0) * 220.0 * std::f32::consts::TAU).sin() * 0.5;
        writer.write_sample((value * i16::MAX as f32) as i16).unwrap();
    }
    writer.finalize().unwrap();
    path
}

// ============================================================================
// Tests
// ============================================================================

#[test]
fn missing_bridges_fail_fast() {
    let err = WaveformEngine::new(EngineConfig::default(), EngineDependencies::new()).unwrap_err();
    assert!(matches!(
        err,
        CoreError::CapabilityMissing { ref capability, .. } if capability == "PlaybackBackend"
    ));

    let partial = EngineDependencies::new().with_playback(Arc::new(ClockedBackend {
        duration: Duration::from_secs(1),
    }));
    let err = WaveformEngine::new(EngineConfig::default(), partial).unwrap_err();
    assert!(matches!(
        err,
        CoreError::CapabilityMissing { ref capability, .. } if capability == "RecorderBackend"
    ));
}

#[tokio::test(start_paused = true)]
async fn fifteen_second_track_finishes_once_in_stop_mode() {
    let engine = engine(Duration::from_secs(15));
    let mut stream = engine.subscribe();

    let duration = engine
        .prepare_player("a", PrepareRequest::new("/music/a.m4a"))
        .await
        .unwrap();
    assert_eq!(duration, 15_000);
    assert!(engine.start_player("a", FinishMode::Stop, None).await.unwrap());

    tokio::time::sleep(Duration::from_secs(17)).await;

    assert_eq!(finished(&mut stream), vec![("a".to_string(), FinishMode::Stop)]);
    assert_eq!(engine.registry().active_player_count(), 0);
    assert_eq!(engine.get_duration("a", DurationType::Max).await.unwrap(), None);
}

#[tokio::test(start_paused = true)]
async fn thirty_first_track_is_rejected() {
    let engine = engine(Duration::from_secs(60));

    for n in 0..30 {
        engine
            .prepare_player(&format!("p{n}"), PrepareRequest::new("/music/a.m4a"))
            .await
            .unwrap();
    }
    assert_eq!(engine.registry().active_player_count(), 30);

    let err = engine
        .prepare_player("p30", PrepareRequest::new("/music/a.m4a"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Capacity);
    assert!(engine.registry().player(&key("p30")).is_none());
    assert_eq!(engine.registry().active_player_count(), 30);

    // Re-preparing an existing key replaces its own track.
    engine
        .prepare_player("p0", PrepareRequest::new("/music/b.m4a"))
        .await
        .unwrap();

    // Releasing one frees a slot.
    assert!(engine.stop_player("p1").await.unwrap());
    engine
        .prepare_player("p30", PrepareRequest::new("/music/a.m4a"))
        .await
        .unwrap();
    assert_eq!(engine.registry().active_player_count(), 30);
}

#[tokio::test(start_paused = true)]
async fn unknown_keys_are_no_ops() {
    let engine = engine(Duration::from_secs(5));

    assert!(!engine.pause_player("nobody").await.unwrap());
    assert!(engine.stop_player("nobody").await.unwrap(), "stop always succeeds");
    assert!(!engine.seek_to("nobody", 10.0).await.unwrap());
    assert!(!engine.set_volume("nobody", 0.5).await.unwrap());
    assert!(!engine.set_playback_speed("nobody", 1.5).await.unwrap());
    assert_eq!(engine.get_duration("nobody", DurationType::Current).await.unwrap(), None);
    assert!(!engine.mark_player_unmounted("nobody").unwrap());

    let err = engine.start_player("nobody", FinishMode::Loop, None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let err = engine.pause_player("   ").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[tokio::test(start_paused = true)]
async fn stopping_twice_succeeds_both_times() {
    let engine = engine(Duration::from_secs(5));
    let mut stream = engine.subscribe();

    engine
        .prepare_player("a", PrepareRequest::new("/music/a.m4a"))
        .await
        .unwrap();
    engine.start_player("a", FinishMode::Stop, None).await.unwrap();

    assert!(engine.stop_player("a").await.unwrap());
    assert!(engine.stop_player("a").await.unwrap());
    assert_eq!(engine.registry().player_count(), 0);

    // Nothing left to tick, so no finish ever fires.
    tokio::time::sleep(Duration::from_secs(6)).await;
    assert!(finished(&mut stream).is_empty());
}

#[tokio::test(start_paused = true)]
async fn missing_file_is_not_found_and_creates_no_track() {
    let engine = engine(Duration::from_secs(5));
    let err = engine
        .prepare_player("a", PrepareRequest::new("/missing/a.m4a"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(engine.registry().active_player_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn unmounted_sessions_stop_emitting() {
    let engine = engine(Duration::from_secs(2));
    let mut stream = engine.subscribe();

    engine.init_player("a").unwrap();
    engine
        .prepare_player("a", PrepareRequest::new("/music/a.m4a"))
        .await
        .unwrap();
    engine.start_player("a", FinishMode::Stop, None).await.unwrap();
    engine.mark_all_unmounted();
    stream.drain();

    tokio::time::sleep(Duration::from_secs(3)).await;
    assert!(stream.drain().is_empty());
}

#[tokio::test]
async fn three_second_file_yields_fifty_display_values() {
    let engine = engine(Duration::from_secs(1));
    let path = write_wav(3);

    let outcome = engine.extract_waveform("wave", &path, 50).await.unwrap();
    let samples = outcome.samples().unwrap();
    assert_eq!(samples.len(), 50);
    assert!(samples.iter().all(|v| (-0.12..=0.12).contains(v)));
    assert_eq!(engine.registry().extractor_count(), 0);

    std::fs::remove_file(path).ok();
}

#[tokio::test]
async fn stop_all_extractors_resolves_pending_extraction() {
    let config = EngineConfig::default();
    let engine = Arc::new(
        WaveformEngine::new(
            config,
            deps(Duration::from_secs(1)).with_decoders(Arc::new(StallingProvider)),
        )
        .unwrap(),
    );

    let task = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move { engine.extract_waveform("w", "/audio/endless.wav", 10).await })
    };

    while engine.registry().extractor_count() == 0 {
        tokio::task::yield_now().await;
    }
    assert!(!engine.stop_extraction("other").unwrap());
    assert_eq!(engine.stop_all_extractors(), 1);

    let outcome = tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .expect("extraction must not hang")
        .unwrap()
        .unwrap();
    assert_eq!(outcome, ExtractionOutcome::Stopped);
}

#[tokio::test(start_paused = true)]
async fn short_recording_maps_to_its_kind() -> anyhow::Result<()> {
    let engine = engine(Duration::from_secs(1));
    assert!(engine.start_recording(engine.recording_request()).await?);

    let err = engine.stop_recording().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ShortRecording);

    tokio::time::sleep(Duration::from_millis(600)).await;
    let done = engine.stop_recording().await?.expect("recording was active");
    assert_eq!(done.duration_ms, 2_000);
    assert!(done.path.starts_with(std::env::temp_dir()));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn shutdown_releases_everything() {
    let engine = engine(Duration::from_secs(10));
    engine
        .prepare_player("a", PrepareRequest::new("/music/a.m4a"))
        .await
        .unwrap();
    engine.start_recording(engine.recording_request()).await.unwrap();

    engine.shutdown().await;

    assert_eq!(engine.registry().player_count(), 0);
    assert_eq!(engine.recorder_state().await, RecorderState::Stopped);
}
