//! Microphone capture built on `cpal`, written to WAV with `hound`.
//!
//! Each recording runs on its own thread. The thread opens the default
//! input device, builds an input stream for the device's sample format and
//! feeds converted `f32` samples into a 32-bit float WAV writer. The cpal
//! stream never leaves that thread.
//!
//! The requested encoder and container are not available on desktop; the
//! file is always RIFF/WAVE regardless of the path's extension.

use async_trait::async_trait;
use bridge_traits::error::{BridgeError, Result};
use bridge_traits::recording::{
    AmplitudeSample, EncoderConfig, OutputFormat, RecorderBackend, RecordingHandle,
};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use parking_lot::Mutex;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::mpsc::{self, Receiver, Sender, SyncSender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, warn};

// ============================================================================
// Peak Meter
// ============================================================================

/// Highest absolute sample since the last read.
#[derive(Debug, Default)]
pub(crate) struct PeakMeter {
    bits: AtomicU32,
}

impl PeakMeter {
    pub(crate) fn record(&self, samples: &[f32]) {
        let peak = samples
            .iter()
            .map(|s| s.abs())
            .filter(|s| s.is_finite())
            .fold(0.0f32, f32::max);
        // Non-negative floats order the same as their bit patterns.
        self.bits.fetch_max(peak.to_bits(), Ordering::AcqRel);
    }

    /// Read and reset.
    pub(crate) fn take(&self) -> f32 {
        f32::from_bits(self.bits.swap(0, Ordering::AcqRel))
    }
}

// ============================================================================
// Sample Conversion
// ============================================================================

/// Average interleaved frames down to one channel.
pub(crate) fn downmix_to_mono(data: &[f32], channels: usize) -> Vec<f32> {
    let channels = channels.max(1);
    data.chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect()
}

fn convert<T>(data: &[T], to_f32: impl Fn(&T) -> f32) -> Vec<f32> {
    data.iter().map(to_f32).collect()
}

// ============================================================================
// Capture Thread
// ============================================================================

enum Command {
    Samples(Vec<f32>),
    Finish(SyncSender<Result<()>>),
}

struct CaptureShared {
    meter: PeakMeter,
    paused: AtomicBool,
}

struct WavSink {
    writer: hound::WavWriter<BufWriter<File>>,
    frames: u64,
    channels: u16,
}

impl WavSink {
    fn create(path: &Path, sample_rate: u32, channels: u16) -> Result<Self> {
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        let file = File::create(path).map_err(BridgeError::Io)?;
        let writer = hound::WavWriter::new(BufWriter::new(file), spec)
            .map_err(|e| BridgeError::OperationFailed(format!("failed to create wav writer: {e}")))?;
        Ok(Self {
            writer,
            frames: 0,
            channels,
        })
    }

    fn write(&mut self, samples: &[f32]) -> Result<()> {
        for sample in samples {
            self.writer
                .write_sample(*sample)
                .map_err(|e| BridgeError::OperationFailed(format!("failed to write sample: {e}")))?;
        }
        self.frames += (samples.len() / self.channels.max(1) as usize) as u64;
        Ok(())
    }

    fn finalize(self) -> Result<u64> {
        self.writer
            .finalize()
            .map_err(|e| BridgeError::OperationFailed(format!("failed to finalize wav: {e}")))?;
        Ok(self.frames)
    }
}

fn build_stream(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    sample_format: cpal::SampleFormat,
    mono: bool,
    shared: Arc<CaptureShared>,
    commands: Sender<Command>,
) -> Result<cpal::Stream> {
    let channels = config.channels as usize;
    let deliver = move |samples: Vec<f32>| {
        if shared.paused.load(Ordering::Acquire) {
            return;
        }
        shared.meter.record(&samples);
        let samples = if mono && channels > 1 {
            downmix_to_mono(&samples, channels)
        } else {
            samples
        };
        let _ = commands.send(Command::Samples(samples));
    };
    let on_error = |err| warn!("Audio input stream error: {err}");

    let stream = match sample_format {
        cpal::SampleFormat::F32 => device.build_input_stream(
            config,
            move |data: &[f32], _| deliver(data.to_vec()),
            on_error,
            None,
        ),
        cpal::SampleFormat::I16 => device.build_input_stream(
            config,
            move |data: &[i16], _| deliver(convert(data, |s| *s as f32 / i16::MAX as f32)),
            on_error,
            None,
        ),
        cpal::SampleFormat::U16 => device.build_input_stream(
            config,
            move |data: &[u16], _| deliver(convert(data, |s| (*s as f32 - 32_768.0) / 32_768.0)),
            on_error,
            None,
        ),
        cpal::SampleFormat::I32 => device.build_input_stream(
            config,
            move |data: &[i32], _| deliver(convert(data, |s| *s as f32 / i32::MAX as f32)),
            on_error,
            None,
        ),
        cpal::SampleFormat::F64 => device.build_input_stream(
            config,
            move |data: &[f64], _| deliver(convert(data, |s| *s as f32)),
            on_error,
            None,
        ),
        format => {
            return Err(BridgeError::Unsupported(format!(
                "input sample format {format:?}"
            )))
        }
    };
    stream.map_err(|e| BridgeError::Device(format!("failed to open input stream: {e}")))
}

/// Pick the device config closest to the request: the requested rate when
/// a supported range covers it, otherwise the device default.
fn resolve_config(
    device: &cpal::Device,
    requested_rate: u32,
) -> Result<(cpal::StreamConfig, cpal::SampleFormat)> {
    let default = device
        .default_input_config()
        .map_err(|e| BridgeError::Device(format!("no default input config: {e}")))?;

    let matching = device.supported_input_configs().ok().and_then(|mut ranges| {
        ranges.find(|range| {
            range.sample_format() == default.sample_format()
                && range.min_sample_rate().0 <= requested_rate
                && requested_rate <= range.max_sample_rate().0
        })
    });

    let supported = match matching {
        Some(range) => range.with_sample_rate(cpal::SampleRate(requested_rate)),
        None => {
            debug!(
                requested_rate,
                default_rate = default.sample_rate().0,
                "Requested sample rate unsupported, using device default"
            );
            default
        }
    };
    Ok((supported.config(), supported.sample_format()))
}

fn capture_loop(
    path: PathBuf,
    requested: EncoderConfig,
    shared: Arc<CaptureShared>,
    ready: SyncSender<Result<()>>,
    commands: Sender<Command>,
    inbox: Receiver<Command>,
) {
    let setup = (|| {
        let device = cpal::default_host()
            .default_input_device()
            .ok_or_else(|| BridgeError::Device("no input device available".to_string()))?;
        let (config, sample_format) = resolve_config(&device, requested.sample_rate)?;
        let mono = requested.channels == 1;
        let channels = if mono { 1 } else { config.channels };

        let sink = WavSink::create(&path, config.sample_rate.0, channels)?;
        let stream = build_stream(&device, &config, sample_format, mono, shared, commands)?;
        stream
            .play()
            .map_err(|e| BridgeError::Device(format!("failed to start input stream: {e}")))?;
        Ok::<_, BridgeError>((stream, sink))
    })();

    let (stream, mut sink) = match setup {
        Ok(parts) => {
            let _ = ready.send(Ok(()));
            parts
        }
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };

    let mut stream = Some(stream);
    let mut write_error = None;
    while let Ok(command) = inbox.recv() {
        match command {
            Command::Samples(samples) => {
                if write_error.is_none() {
                    if let Err(e) = sink.write(&samples) {
                        warn!(error = %e, "Dropping recording data after write failure");
                        write_error = Some(e);
                    }
                }
            }
            Command::Finish(reply) => {
                drop(stream.take());
                // Drain what the callback queued before the stream closed.
                while let Ok(Command::Samples(samples)) = inbox.try_recv() {
                    if write_error.is_none() {
                        write_error = sink.write(&samples).err();
                    }
                }
                let result = match write_error.take() {
                    Some(e) => Err(e),
                    None => sink.finalize().map(|frames| {
                        debug!(path = %path.display(), frames, "Recording finalized");
                    }),
                };
                let _ = reply.send(result);
                return;
            }
        }
    }
}

// ============================================================================
// Backend & Handle
// ============================================================================

/// [`RecorderBackend`] capturing the default input device to WAV.
#[derive(Debug, Clone, Copy, Default)]
pub struct CpalRecorderBackend;

impl CpalRecorderBackend {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl RecorderBackend for CpalRecorderBackend {
    fn output_format(&self, _requested: OutputFormat) -> OutputFormat {
        OutputFormat::Wav
    }

    async fn start(&self, path: &Path, config: &EncoderConfig) -> Result<Box<dyn RecordingHandle>> {
        if config.output_format != OutputFormat::Wav {
            debug!(
                requested = ?config.output_format,
                "Desktop recorder writes WAV regardless of the requested container"
            );
        }

        let shared = Arc::new(CaptureShared {
            meter: PeakMeter::default(),
            paused: AtomicBool::new(false),
        });
        let (commands, inbox) = mpsc::channel();
        let (ready_tx, ready_rx) = mpsc::sync_channel(1);

        let thread = {
            let path = path.to_path_buf();
            let config = config.clone();
            let shared = Arc::clone(&shared);
            let commands = commands.clone();
            thread::Builder::new()
                .name("cpal-capture".to_string())
                .spawn(move || capture_loop(path, config, shared, ready_tx, commands, inbox))
                .map_err(|e| BridgeError::Device(format!("failed to spawn capture thread: {e}")))?
        };

        let ready = tokio::task::spawn_blocking(move || ready_rx.recv())
            .await
            .map_err(|e| BridgeError::OperationFailed(format!("capture startup failed: {e}")))?
            .map_err(|_| BridgeError::Device("capture thread exited during startup".to_string()))?;
        ready?;

        debug!(path = %path.display(), "Capture started");
        Ok(Box::new(CpalRecordingHandle {
            shared,
            commands: Mutex::new(Some(commands)),
            thread: Mutex::new(Some(thread)),
        }))
    }
}

struct CpalRecordingHandle {
    shared: Arc<CaptureShared>,
    commands: Mutex<Option<Sender<Command>>>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl RecordingHandle for CpalRecordingHandle {
    fn supports_pause(&self) -> bool {
        true
    }

    fn pause(&self) -> Result<()> {
        self.shared.paused.store(true, Ordering::Release);
        Ok(())
    }

    fn resume(&self) -> Result<()> {
        self.shared.paused.store(false, Ordering::Release);
        Ok(())
    }

    fn amplitude(&self) -> AmplitudeSample {
        AmplitudeSample::new(self.shared.meter.take(), 1.0)
    }

    fn finish(&self) -> Result<()> {
        let Some(commands) = self.commands.lock().take() else {
            return Ok(());
        };

        let (reply_tx, reply_rx) = mpsc::sync_channel(1);
        let result = match commands.send(Command::Finish(reply_tx)) {
            Ok(()) => reply_rx
                .recv()
                .map_err(|_| BridgeError::OperationFailed("capture thread vanished".to_string()))
                .and_then(|result| result),
            Err(_) => Err(BridgeError::OperationFailed(
                "capture thread already stopped".to_string(),
            )),
        };

        if let Some(thread) = self.thread.lock().take() {
            if thread.join().is_err() {
                warn!("Capture thread panicked");
            }
        }
        result
    }
}

impl Drop for CpalRecordingHandle {
    fn drop(&mut self) {
        if let Err(e) = self.finish() {
            warn!(error = %e, "Failed to finalize dropped recording");
        }
    }
}
