//! Playback backend built on `rodio`.
//!
//! One output stream is opened per backend on a dedicated thread (the cpal
//! stream behind it is not `Send` on every platform); that thread hands back
//! the stream's mixer and then parks until the backend is dropped. Every
//! loaded track gets its own [`Sink`] on that mixer.

use async_trait::async_trait;
use bridge_traits::error::{BridgeError, Result};
use bridge_traits::playback::{PlaybackBackend, PlaybackHandle, PlaybackOptions};
use rodio::mixer::Mixer;
use rodio::{Decoder, Sink, Source};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

type FileDecoder = Decoder<BufReader<File>>;

fn open_decoder(path: &Path) -> Result<FileDecoder> {
    let file = File::open(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            BridgeError::NotFound(path.display().to_string())
        } else {
            BridgeError::Io(e)
        }
    })?;
    Decoder::new(BufReader::new(file))
        .map_err(|e| BridgeError::Unsupported(format!("{}: {e}", path.display())))
}

// ============================================================================
// Output Stream Thread
// ============================================================================

/// Keeps the output stream alive until dropped.
struct OutputThread {
    shutdown: mpsc::Sender<()>,
}

impl OutputThread {
    fn spawn() -> Result<(Self, Mixer)> {
        let (ready_tx, ready_rx) = mpsc::sync_channel(1);
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

        thread::Builder::new()
            .name("rodio-output".to_string())
            .spawn(move || {
                let mut stream = match rodio::OutputStreamBuilder::open_default_stream() {
                    Ok(stream) => stream,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e.to_string()));
                        return;
                    }
                };
                stream.log_on_drop(false);
                let _ = ready_tx.send(Ok(stream.mixer().clone()));
                // Returns once the backend drops its sender.
                let _ = shutdown_rx.recv();
                debug!("Closing audio output stream");
            })
            .map_err(|e| BridgeError::Device(format!("failed to spawn output thread: {e}")))?;

        let mixer = ready_rx
            .recv()
            .map_err(|_| BridgeError::Device("output thread exited during startup".to_string()))?
            .map_err(|e| BridgeError::Device(format!("no audio output device: {e}")))?;

        Ok((
            Self {
                shutdown: shutdown_tx,
            },
            mixer,
        ))
    }
}

impl Drop for OutputThread {
    fn drop(&mut self) {
        let _ = self.shutdown.send(());
    }
}

// ============================================================================
// Backend
// ============================================================================

/// [`PlaybackBackend`] playing local files through the default output device.
pub struct RodioPlaybackBackend {
    mixer: Mixer,
    _output: OutputThread,
}

impl RodioPlaybackBackend {
    /// Open the default output device.
    ///
    /// # Errors
    ///
    /// [`BridgeError::Device`] when no output device is available.
    pub fn new() -> Result<Self> {
        let (output, mixer) = OutputThread::spawn()?;
        debug!("Rodio playback backend ready");
        Ok(Self {
            mixer,
            _output: output,
        })
    }
}

impl std::fmt::Debug for RodioPlaybackBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RodioPlaybackBackend").finish_non_exhaustive()
    }
}

#[async_trait]
impl PlaybackBackend for RodioPlaybackBackend {
    async fn load(&self, path: &Path, options: PlaybackOptions) -> Result<Box<dyn PlaybackHandle>> {
        let owned = path.to_path_buf();
        let mixer = self.mixer.clone();

        let handle = tokio::task::spawn_blocking(move || RodioHandle::open(owned, &mixer, options))
            .await
            .map_err(|e| BridgeError::OperationFailed(format!("load task failed: {e}")))??;

        Ok(Box::new(handle))
    }
}

// ============================================================================
// Handle
// ============================================================================

/// One loaded track: a paused sink holding a file decoder.
struct RodioHandle {
    path: PathBuf,
    sink: Sink,
    duration: Duration,
    released: AtomicBool,
}

impl RodioHandle {
    fn open(path: PathBuf, mixer: &Mixer, options: PlaybackOptions) -> Result<Self> {
        let mut decoder = open_decoder(&path)?;

        let duration = decoder.total_duration().unwrap_or_else(|| {
            warn!(path = %path.display(), "Container does not report a duration");
            Duration::ZERO
        });

        let start = options.start_position.min(duration);
        if !start.is_zero() {
            if let Err(e) = decoder.try_seek(start) {
                warn!(path = %path.display(), error = %e, "Failed to apply start position");
            }
        }

        let sink = Sink::connect_new(mixer);
        sink.pause();
        sink.set_volume(options.initial_volume);
        sink.set_speed(options.speed);
        sink.append(decoder);

        debug!(path = %path.display(), duration_ms = duration.as_millis() as u64, "Track loaded");
        Ok(Self {
            path,
            sink,
            duration,
            released: AtomicBool::new(false),
        })
    }

    fn ensure_live(&self) -> Result<()> {
        if self.released.load(Ordering::Acquire) {
            return Err(BridgeError::OperationFailed(
                "track was released".to_string(),
            ));
        }
        Ok(())
    }
}

impl PlaybackHandle for RodioHandle {
    fn duration(&self) -> Duration {
        self.duration
    }

    fn position(&self) -> Duration {
        if self.sink.empty() {
            return self.duration;
        }
        let position = self.sink.get_pos();
        if self.duration.is_zero() {
            position
        } else {
            position.min(self.duration)
        }
    }

    fn play(&self) -> Result<()> {
        self.ensure_live()?;
        self.sink.play();
        Ok(())
    }

    fn pause(&self) -> Result<()> {
        self.ensure_live()?;
        self.sink.pause();
        Ok(())
    }

    fn seek(&self, position: Duration) -> Result<()> {
        self.ensure_live()?;
        // A drained sink has dropped its source; queue the file again.
        if self.sink.empty() {
            self.sink.append(open_decoder(&self.path)?);
        }
        self.sink
            .try_seek(position)
            .map_err(|e| BridgeError::OperationFailed(format!("seek failed: {e}")))
    }

    fn set_volume(&self, volume: f32) -> Result<()> {
        self.ensure_live()?;
        self.sink.set_volume(volume);
        Ok(())
    }

    fn set_speed(&self, speed: f32) -> Result<()> {
        self.ensure_live()?;
        self.sink.set_speed(speed);
        Ok(())
    }

    fn is_finished(&self) -> bool {
        !self.released.load(Ordering::Acquire) && self.sink.empty()
    }

    fn release(&self) {
        if !self.released.swap(true, Ordering::AcqRel) {
            self.sink.stop();
            debug!(path = %self.path.display(), "Track released");
        }
    }
}

impl Drop for RodioHandle {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_maps_to_not_found() {
        let err = open_decoder(Path::new("/definitely/not/here.wav")).err().unwrap();
        assert!(err.is_not_found());
    }

    #[test]
    fn garbage_maps_to_unsupported() {
        let path = std::env::temp_dir().join(format!("bridge-desktop-{}.wav", uuid::Uuid::new_v4()));
        std::fs::write(&path, b"definitely not a riff header").unwrap();

        let err = open_decoder(&path).err().unwrap();
        assert!(matches!(err, BridgeError::Unsupported(_)));

        std::fs::remove_file(path).ok();
    }
}
