// Integration tests for the capture devices
//
// WAV fixtures are generated into a temp dir with hound.

use anyhow::Result;
use realtime_voice::audio::{
    AudioFile, FileMicrophone, Microphone, MicrophoneConstraints, MicrophoneFactory,
    MicrophoneSource, SyntheticMicrophone, FRAME_MS,
};
use realtime_voice::error::DeviceError;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;

fn write_wav(dir: &Path, name: &str, sample_rate: u32, channels: u16, seconds: f32) -> Result<PathBuf> {
    let path = dir.join(name);
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(&path, spec)?;
    let total = (sample_rate as f32 * seconds) as usize * channels as usize;
    for i in 0..total {
        writer.write_sample(((i % 200) as i16 - 100) * 50)?;
    }
    writer.finalize()?;

    Ok(path)
}

#[test]
fn test_audio_file_open() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let path = write_wav(temp_dir.path(), "speech.wav", 16000, 1, 0.5)?;

    let audio = AudioFile::open(&path)?;

    assert!((audio.duration_seconds - 0.5).abs() < 0.001);
    assert_eq!(audio.sample_rate, 16000);
    assert_eq!(audio.channels, 1);
    assert_eq!(audio.samples.len(), 8000);
    assert!(audio.path.contains("speech.wav"));

    Ok(())
}

#[test]
fn test_audio_file_nonexistent() {
    let result = AudioFile::open("/nonexistent/path/to/audio.wav");
    assert!(result.is_err(), "Opening nonexistent file should fail");
}

#[tokio::test]
async fn test_missing_file_is_not_found() {
    let mic = FileMicrophone::new("/nonexistent/microphone.wav");
    let result = mic.acquire(&MicrophoneConstraints::default()).await;

    assert!(matches!(result, Err(DeviceError::NotFound(_))));
}

#[tokio::test]
async fn test_non_wav_file_is_unsupported() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let path = temp_dir.path().join("notes.wav");
    std::fs::write(&path, b"definitely not RIFF")?;

    let result = FileMicrophone::new(&path)
        .acquire(&MicrophoneConstraints::default())
        .await;

    assert!(matches!(result, Err(DeviceError::Unsupported(_))));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_file_capture_conforms_to_constraints() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let path = write_wav(temp_dir.path(), "stereo-48k.wav", 48000, 2, 0.2)?;

    let mic = MicrophoneFactory::create(MicrophoneSource::File(path));
    let mut device = mic.acquire(&MicrophoneConstraints::default()).await?;
    assert_eq!(device.settings().sample_rate, 16000);
    assert!(!device.settings().echo_cancellation);

    let mut frames = device.start().await?;
    let mut received = Vec::new();
    while let Some(frame) = frames.recv().await {
        received.push(frame);
    }

    // 200ms of audio in 20ms frames
    assert_eq!(received.len(), 10);
    for (i, frame) in received.iter().enumerate() {
        assert_eq!(frame.sample_rate, 16000);
        assert_eq!(frame.channels, 1);
        assert_eq!(frame.samples.len(), 320);
        assert_eq!(frame.timestamp_ms, i as u64 * FRAME_MS);
    }

    device.release().await?;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_synthetic_capture_stop_and_restart() -> Result<()> {
    let mic = SyntheticMicrophone::new(220.0);
    let mut device = mic.acquire(&MicrophoneConstraints::default()).await?;
    assert!(!device.is_capturing());

    let mut frames = device.start().await?;
    assert!(device.is_capturing());
    assert!(device.start().await.is_err(), "second start should be rejected");

    tokio::time::sleep(Duration::from_millis(100)).await;
    device.stop().await?;
    assert!(!device.is_capturing());

    let mut count = 0;
    while let Some(frame) = frames.recv().await {
        assert_eq!(frame.samples.len(), 320);
        assert!(frame.samples.iter().any(|&s| s != 0));
        count += 1;
    }
    assert!((5..=6).contains(&count), "got {} frames", count);

    // a stopped device can start again
    let _frames = device.start().await?;
    assert!(device.is_capturing());
    device.release().await?;
    Ok(())
}
