//! # Waveform Extraction
//!
//! Streams a file through a [`DecoderProvider`], downsamples it to a fixed
//! number of RMS buckets and normalizes the result for display.
//!
//! ## Overview
//!
//! One [`WaveformExtractor`] serves one session key. Extraction is a pull
//! loop over `decode_frames`; the cancellation token is checked at every
//! chunk boundary and raced against every decoder await, so a forced stop
//! resolves promptly with [`ExtractionOutcome::Stopped`] even if the
//! decoder stalls.
//!
//! Progress events carry the raw (un-normalized) buckets closed so far.

use crate::downsampler::RmsDownsampler;
use crate::error::{Result, WaveformError};
use crate::normalizer::normalize_with;
use bridge_traits::playback::{AudioSource, DecoderProvider};
use core_runtime::config::{EngineConfig, NormalizationConfig};
use core_runtime::events::{CoreEvent, EventBus, ExtractionEvent};
use core_runtime::session::SessionKey;
use parking_lot::Mutex;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Result of a finished extraction call.
#[derive(Debug, Clone, PartialEq)]
pub enum ExtractionOutcome {
    /// Normalized buckets, at most the requested count.
    Completed(Vec<f32>),
    /// The extraction was force-stopped before it finished.
    Stopped,
}

impl ExtractionOutcome {
    pub fn is_stopped(&self) -> bool {
        matches!(self, ExtractionOutcome::Stopped)
    }

    pub fn samples(&self) -> Option<&[f32]> {
        match self {
            ExtractionOutcome::Completed(samples) => Some(samples),
            ExtractionOutcome::Stopped => None,
        }
    }
}

/// Lifecycle of an extraction job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExtractionStatus {
    #[default]
    Pending,
    Decoding,
    Completed,
    Cancelled,
    Failed,
}

impl ExtractionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ExtractionStatus::Completed | ExtractionStatus::Cancelled | ExtractionStatus::Failed
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractionStatus::Pending => "pending",
            ExtractionStatus::Decoding => "decoding",
            ExtractionStatus::Completed => "completed",
            ExtractionStatus::Cancelled => "cancelled",
            ExtractionStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for ExtractionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Extraction knobs taken from [`EngineConfig`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExtractorSettings {
    pub normalization: NormalizationConfig,
    /// Frames requested per decoder pull.
    pub chunk_frames: usize,
}

impl Default for ExtractorSettings {
    fn default() -> Self {
        Self::from(&EngineConfig::default())
    }
}

impl From<&EngineConfig> for ExtractorSettings {
    fn from(config: &EngineConfig) -> Self {
        Self {
            normalization: config.normalization,
            chunk_frames: config.extraction_chunk_frames,
        }
    }
}

#[derive(Debug, Default)]
struct JobState {
    status: ExtractionStatus,
    progress: f32,
}

/// Cancellable waveform extraction for one session key.
pub struct WaveformExtractor {
    key: SessionKey,
    provider: Arc<dyn DecoderProvider>,
    events: EventBus,
    settings: ExtractorSettings,
    cancel: CancellationToken,
    job: Mutex<JobState>,
}

impl WaveformExtractor {
    pub fn new(
        key: SessionKey,
        provider: Arc<dyn DecoderProvider>,
        events: EventBus,
        settings: ExtractorSettings,
    ) -> Self {
        Self {
            key,
            provider,
            events,
            settings,
            cancel: CancellationToken::new(),
            job: Mutex::new(JobState::default()),
        }
    }

    pub fn key(&self) -> &SessionKey {
        &self.key
    }

    pub fn status(&self) -> ExtractionStatus {
        self.job.lock().status
    }

    /// Last reported progress in `[0, 1]`.
    pub fn progress(&self) -> f32 {
        self.job.lock().progress
    }

    /// Request cooperative cancellation. Idempotent.
    pub fn force_stop(&self) {
        if !self.cancel.is_cancelled() {
            debug!(session_key = %self.key, "Extraction force-stopped");
            self.cancel.cancel();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    fn emit(&self, event: ExtractionEvent) {
        let _ = self.events.emit(CoreEvent::Extraction(event));
    }

    fn set_status(&self, status: ExtractionStatus) {
        self.job.lock().status = status;
    }

    fn report_progress(&self, progress: f32, samples: Vec<f32>) {
        {
            let mut job = self.job.lock();
            if progress < job.progress {
                return;
            }
            job.progress = progress;
        }
        self.emit(ExtractionEvent::Progress {
            session_key: self.key.clone(),
            progress,
            samples,
        });
    }

    fn stopped(&self) -> Result<ExtractionOutcome> {
        self.set_status(ExtractionStatus::Cancelled);
        self.emit(ExtractionEvent::Cancelled {
            session_key: self.key.clone(),
        });
        info!(session_key = %self.key, "Extraction stopped");
        Ok(ExtractionOutcome::Stopped)
    }

    fn failed(&self, err: WaveformError) -> Result<ExtractionOutcome> {
        warn!(session_key = %self.key, error = %err, "Extraction failed");
        self.set_status(ExtractionStatus::Failed);
        self.emit(ExtractionEvent::Failed {
            session_key: self.key.clone(),
            message: err.to_string(),
        });
        Err(err)
    }

    /// Extract `expected_points` normalized buckets from `path`.
    ///
    /// # Errors
    ///
    /// - [`WaveformError::Validation`] for an empty path or zero points
    /// - [`WaveformError::FileNotFound`] when the file cannot be opened
    /// - [`WaveformError::Decode`] for unsupported formats, unknown stream
    ///   length or mid-stream decode failures (partial output is discarded)
    #[instrument(skip(self, path), fields(session_key = %self.key))]
    pub async fn extract(&self, path: &Path, expected_points: usize) -> Result<ExtractionOutcome> {
        if path.as_os_str().is_empty() {
            return Err(WaveformError::Validation("path is empty".to_string()));
        }
        if expected_points == 0 {
            return Err(WaveformError::Validation(
                "expected point count must be greater than 0".to_string(),
            ));
        }
        if self.cancel.is_cancelled() {
            return self.stopped();
        }

        self.set_status(ExtractionStatus::Decoding);
        let source = AudioSource::local(path);
        let file_name = source.label();

        let opened = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return self.stopped(),
            opened = self.provider.open(&source) => opened,
        };
        let mut decoder = match opened {
            Ok(decoder) => decoder,
            Err(e) => return self.failed(WaveformError::from_bridge(e, &file_name)),
        };

        let probed = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return self.stopped(),
            probed = decoder.probe() => probed,
        };
        let probe = match probed {
            Ok(probe) => probe,
            Err(e) => return self.failed(WaveformError::from_bridge(e, &file_name)),
        };
        let Some(total_frames) = probe.total_frames else {
            return self.failed(WaveformError::Decode("unknown stream length".to_string()));
        };

        let mut downsampler =
            match RmsDownsampler::new(total_frames, expected_points, probe.format.channels) {
                Ok(ds) => ds,
                Err(e) => return self.failed(e),
            };

        debug!(
            file = %file_name,
            total_frames,
            bucket_width = downsampler.bucket_width(),
            "Extraction started"
        );

        loop {
            if self.cancel.is_cancelled() {
                return self.stopped();
            }

            let next = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return self.stopped(),
                next = decoder.decode_frames(self.settings.chunk_frames) => next,
            };

            let chunk = match next {
                Ok(Some(chunk)) => chunk,
                Ok(None) => break,
                Err(e) => return self.failed(WaveformError::Decode(e.to_string())),
            };

            if downsampler.push_chunk(&chunk) > 0 && !self.cancel.is_cancelled() {
                self.report_progress(downsampler.progress(), downsampler.buckets().to_vec());
            }

            // Decoding is CPU-bound; let other tasks (and cancellation) in.
            tokio::task::yield_now().await;
        }
        drop(decoder);

        if self.cancel.is_cancelled() {
            return self.stopped();
        }

        let raw = downsampler.finish();
        self.report_progress(1.0, raw.clone());

        let samples = normalize_with(&raw, &self.settings.normalization);
        self.set_status(ExtractionStatus::Completed);
        self.emit(ExtractionEvent::Completed {
            session_key: self.key.clone(),
            bucket_count: samples.len(),
        });

        info!(buckets = samples.len(), "Extraction completed");
        Ok(ExtractionOutcome::Completed(samples))
    }
}

impl fmt::Debug for WaveformExtractor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let job = self.job.lock();
        f.debug_struct("WaveformExtractor")
            .field("key", &self.key)
            .field("status", &job.status)
            .field("progress", &job.progress)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}
