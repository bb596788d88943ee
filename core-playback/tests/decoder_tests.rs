//! Symphonia decoder tests against WAV fixtures written with hound.

use bridge_traits::playback::{AudioCodec, AudioDecoder, AudioSource, DecoderProvider};
use core_playback::{SymphoniaDecoder, SymphoniaDecoderProvider};
use std::path::PathBuf;

fn write_wav(channels: u16, sample_rate: u32, frames: usize, amplitude: i16) -> PathBuf {
    let path = std::env::temp_dir().join(format!("core-playback-{}.wav", uuid::Uuid::new_v4()));
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(&path, spec).unwrap();
    for frame in 0..frames {
        for channel in 0..channels {
            // Left channel alternates sign, right channel is silent.
            let value = if channel == 0 {
                if frame % 2 == 0 { amplitude } else { -amplitude }
            } else {
                0
            };
            writer.write_sample(value).unwrap();
        }
    }
    writer.finalize().unwrap();
    path
}

#[tokio::test]
async fn decodes_every_frame_in_bounded_chunks() {
    let path = write_wav(2, 8_000, 10_000, i16::MAX / 2);
    let mut decoder = SymphoniaDecoder::new(AudioSource::local(&path)).await.unwrap();

    let probe = decoder.probe_result();
    assert_eq!(probe.format.codec, AudioCodec::Wav);
    assert_eq!(probe.format.sample_rate, 8_000);
    assert_eq!(probe.format.channels, 2);
    assert_eq!(probe.format.bits_per_sample, Some(16));
    assert_eq!(probe.total_frames, Some(10_000));
    assert_eq!(probe.duration.map(|d| d.as_millis()), Some(1_250));

    let mut frames = 0;
    let mut peak = 0.0f32;
    while let Some(chunk) = decoder.next_chunk(1_000).unwrap() {
        assert!(chunk.frames <= 1_000);
        assert_eq!(chunk.channels, 2);
        frames += chunk.frames;
        for frame in chunk.frames_iter() {
            peak = peak.max(frame[0].abs());
            assert_eq!(frame[1], 0.0);
        }
    }

    assert_eq!(frames, 10_000);
    assert!((peak - 0.5).abs() < 0.01, "peak was {peak}");
    assert!(decoder.next_chunk(1_000).unwrap().is_none());

    std::fs::remove_file(path).ok();
}

#[tokio::test]
async fn provider_opens_trait_objects() {
    let path = write_wav(1, 16_000, 1_600, 1_000);
    let provider = SymphoniaDecoderProvider::new();
    let mut decoder = provider.open(&AudioSource::local(&path)).await.unwrap();

    let probe = decoder.probe().await.unwrap();
    assert_eq!(probe.format.channels, 1);
    assert_eq!(probe.total_frames, Some(1_600));

    let chunk = decoder.decode_frames(4_096).await.unwrap().unwrap();
    assert!(chunk.frames > 0);
    assert_eq!(chunk.timestamp, std::time::Duration::ZERO);

    std::fs::remove_file(path).ok();
}

#[tokio::test]
async fn garbage_bytes_are_rejected() {
    let path = std::env::temp_dir().join(format!("core-playback-{}.bin", uuid::Uuid::new_v4()));
    std::fs::write(&path, b"definitely not audio data at all").unwrap();

    let source = AudioSource::local(&path);
    let err = SymphoniaDecoderProvider::new().open(&source).await.err().unwrap();
    assert!(!err.is_not_found());

    std::fs::remove_file(path).ok();
}
