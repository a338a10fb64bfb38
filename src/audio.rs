use crate::constants::{AUDIO_PROMPT_MARKER, MIN_CAPTURE_MS, TARGET_SAMPLE_RATE};
use crate::errors::AppError;
use crate::paths::resolve_captures_dir;
use crate::state::{AppState, MediaSlots};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, StreamConfig};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use tauri::{AppHandle, Emitter, State};
use tracing::{error, info};

#[derive(Debug, Clone, serde::Serialize)]
pub(crate) struct AudioDevice {
    pub(crate) id: String,
    pub(crate) label: String,
}

/// Finalized microphone capture. The WAV file path doubles as the playback
/// handle handed to the webview; releasing the attachment deletes the file.
#[derive(Debug, Clone, serde::Serialize)]
pub(crate) struct AudioAttachment {
    pub(crate) wav_path: PathBuf,
    pub(crate) duration_ms: u64,
    pub(crate) size_bytes: u64,
}

impl AudioAttachment {
    /// Deletes the backing WAV. A missing file is fine: the slot is taken
    /// before release, so a double clear never reaches a live handle twice.
    pub(crate) fn release(self) {
        let _ = std::fs::remove_file(&self.wav_path);
    }
}

/// Mono 16 kHz i16 accumulator fed by the stream callback. Input arrives at
/// the device rate and is linearly resampled on push.
#[derive(Default)]
pub(crate) struct CaptureBuffer {
    samples: Vec<i16>,
    resample_pos: f64,
}

impl CaptureBuffer {
    pub(crate) fn drain(&mut self) -> Vec<i16> {
        let mut out = Vec::new();
        std::mem::swap(&mut out, &mut self.samples);
        self.resample_pos = 0.0;
        out
    }

    pub(crate) fn push_samples(&mut self, input: &[f32], in_rate: u32) {
        if input.is_empty() {
            return;
        }

        if in_rate == TARGET_SAMPLE_RATE {
            for &sample in input {
                self.samples.push(float_to_i16(sample));
            }
            return;
        }

        let ratio = in_rate as f64 / TARGET_SAMPLE_RATE as f64;
        let mut pos = self.resample_pos;

        while pos + 1.0 < input.len() as f64 {
            let idx = pos.floor() as usize;
            let frac = pos - idx as f64;
            let a = input[idx] as f64;
            let b = input[idx + 1] as f64;
            let sample = (a * (1.0 - frac) + b * frac) as f32;
            self.samples.push(float_to_i16(sample));
            pos += ratio;
        }

        self.resample_pos = pos - input.len() as f64;
    }
}

fn float_to_i16(sample: f32) -> i16 {
    let clamped = sample.clamp(-1.0, 1.0);
    (clamped * i16::MAX as f32) as i16
}

fn min_capture_samples() -> usize {
    (TARGET_SAMPLE_RATE as u64 * MIN_CAPTURE_MS / 1000) as usize
}

/// Microphone recorder. The cpal stream is not `Send`, so it lives on a
/// dedicated thread that parks on the stop channel until capture ends.
pub(crate) struct Recorder {
    pub(crate) buffer: Arc<Mutex<CaptureBuffer>>,
    pub(crate) active: bool,
    stop_tx: Option<std::sync::mpsc::Sender<()>>,
    join_handle: Option<thread::JoinHandle<()>>,
}

impl Recorder {
    pub(crate) fn new() -> Self {
        Self {
            buffer: Arc::new(Mutex::new(CaptureBuffer::default())),
            active: false,
            stop_tx: None,
            join_handle: None,
        }
    }
}

#[tauri::command]
pub(crate) fn list_audio_devices() -> Vec<AudioDevice> {
    let mut devices = vec![AudioDevice {
        id: "default".to_string(),
        label: "Default (System)".to_string(),
    }];

    let host = cpal::default_host();
    if let Ok(inputs) = host.input_devices() {
        for (index, device) in inputs.enumerate() {
            let name = device
                .name()
                .unwrap_or_else(|_| format!("Input {}", index + 1));
            let id = format!("input-{}-{}", index, name);
            devices.push(AudioDevice { id, label: name });
        }
    }

    devices
}

fn resolve_input_device(device_id: &str) -> Option<cpal::Device> {
    let host = cpal::default_host();
    if device_id == "default" {
        return host.default_input_device();
    }

    if let Ok(inputs) = host.input_devices() {
        for (index, device) in inputs.enumerate() {
            let name = device
                .name()
                .unwrap_or_else(|_| format!("Input {}", index + 1));
            let id = format!("input-{}-{}", index, name);
            if id == device_id {
                return Some(device);
            }
        }
    }

    host.default_input_device()
}

/// Maps platform error text onto the capture taxonomy. OS messages differ,
/// but denial wording is stable enough to route on.
fn classify_device_error(message: &str) -> AppError {
    let lower = message.to_lowercase();
    if lower.contains("permission") || lower.contains("denied") || lower.contains("not allowed") {
        AppError::PermissionDenied(message.to_string())
    } else {
        AppError::DeviceUnavailable(message.to_string())
    }
}

fn push_mono_samples(buffer: &Arc<Mutex<CaptureBuffer>>, mono: &[f32], sample_rate: u32) {
    if let Ok(mut guard) = buffer.lock() {
        guard.push_samples(mono, sample_rate);
    }
}

fn build_input_stream_f32(
    device: &cpal::Device,
    config: &StreamConfig,
    buffer: Arc<Mutex<CaptureBuffer>>,
) -> Result<cpal::Stream, String> {
    let channels = config.channels as usize;
    let sample_rate = config.sample_rate.0;
    let err_fn = |err| error!("audio stream error: {}", err);

    device
        .build_input_stream(
            config,
            move |data: &[f32], _| {
                let mut mono = Vec::with_capacity(data.len() / channels.max(1));
                for frame in data.chunks(channels.max(1)) {
                    let mut sum = 0.0f32;
                    for &sample in frame {
                        sum += sample;
                    }
                    mono.push((sum / channels.max(1) as f32).clamp(-1.0, 1.0));
                }
                push_mono_samples(&buffer, &mono, sample_rate);
            },
            err_fn,
            None,
        )
        .map_err(|e| e.to_string())
}

fn build_input_stream_i16(
    device: &cpal::Device,
    config: &StreamConfig,
    buffer: Arc<Mutex<CaptureBuffer>>,
) -> Result<cpal::Stream, String> {
    let channels = config.channels as usize;
    let sample_rate = config.sample_rate.0;
    let err_fn = |err| error!("audio stream error: {}", err);

    device
        .build_input_stream(
            config,
            move |data: &[i16], _| {
                let mut mono = Vec::with_capacity(data.len() / channels.max(1));
                for frame in data.chunks(channels.max(1)) {
                    let mut sum = 0.0f32;
                    for &sample in frame {
                        sum += sample as f32 / i16::MAX as f32;
                    }
                    mono.push((sum / channels.max(1) as f32).clamp(-1.0, 1.0));
                }
                push_mono_samples(&buffer, &mono, sample_rate);
            },
            err_fn,
            None,
        )
        .map_err(|e| e.to_string())
}

fn build_input_stream_u16(
    device: &cpal::Device,
    config: &StreamConfig,
    buffer: Arc<Mutex<CaptureBuffer>>,
) -> Result<cpal::Stream, String> {
    let channels = config.channels as usize;
    let sample_rate = config.sample_rate.0;
    let err_fn = |err| error!("audio stream error: {}", err);

    device
        .build_input_stream(
            config,
            move |data: &[u16], _| {
                let mut mono = Vec::with_capacity(data.len() / channels.max(1));
                for frame in data.chunks(channels.max(1)) {
                    let mut sum = 0.0f32;
                    for &sample in frame {
                        let centered = sample as f32 - 32768.0;
                        sum += centered / 32768.0;
                    }
                    mono.push((sum / channels.max(1) as f32).clamp(-1.0, 1.0));
                }
                push_mono_samples(&buffer, &mono, sample_rate);
            },
            err_fn,
            None,
        )
        .map_err(|e| e.to_string())
}

#[tauri::command]
pub(crate) fn start_audio_capture(
    app: AppHandle,
    state: State<'_, AppState>,
) -> Result<(), AppError> {
    let mut recorder = state.recorder.lock().unwrap();
    if recorder.active {
        return Ok(());
    }

    let device_id = state.settings.lock().unwrap().input_device.clone();
    let device = resolve_input_device(&device_id)
        .ok_or_else(|| AppError::DeviceUnavailable("No input device found".to_string()))?;

    let default_config = device
        .default_input_config()
        .map_err(|e| classify_device_error(&e.to_string()))?;
    let sample_format = default_config.sample_format();
    let stream_config: StreamConfig = default_config.into();

    if let Ok(mut guard) = recorder.buffer.lock() {
        let _ = guard.drain();
    }

    let buffer = recorder.buffer.clone();
    let (stop_tx, stop_rx) = std::sync::mpsc::channel::<()>();
    let (ready_tx, ready_rx) = std::sync::mpsc::channel::<Result<(), String>>();

    let join_handle = thread::spawn(move || {
        let result = (|| -> Result<(), String> {
            let stream = match sample_format {
                SampleFormat::F32 => build_input_stream_f32(&device, &stream_config, buffer)?,
                SampleFormat::I16 => build_input_stream_i16(&device, &stream_config, buffer)?,
                SampleFormat::U16 => build_input_stream_u16(&device, &stream_config, buffer)?,
                _ => return Err("Unsupported sample format".to_string()),
            };

            stream.play().map_err(|e| e.to_string())?;
            let _ = ready_tx.send(Ok(()));

            let _ = stop_rx.recv();
            drop(stream);
            Ok(())
        })();

        if let Err(err) = result {
            let _ = ready_tx.send(Err(err));
        }
    });

    let start_result = match ready_rx.recv_timeout(Duration::from_secs(3)) {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) => Err(err),
        Err(_) => Err("Failed to start audio stream".to_string()),
    };

    if let Err(err) = start_result {
        error!("Failed to start capture: {}", err);
        let _ = stop_tx.send(());
        let _ = join_handle.join();
        return Err(classify_device_error(&err));
    }

    recorder.stop_tx = Some(stop_tx);
    recorder.join_handle = Some(join_handle);
    recorder.active = true;

    info!("Audio capture started on device '{}'", device_id);
    let _ = app.emit("capture:state", "recording");
    Ok(())
}

#[tauri::command]
pub(crate) fn stop_audio_capture(
    app: AppHandle,
    state: State<'_, AppState>,
) -> Result<Option<AudioAttachment>, AppError> {
    let samples = {
        let mut recorder = state.recorder.lock().unwrap();
        if !recorder.active {
            // Contract: stopping while not recording has no side effect.
            return Ok(None);
        }

        if let Some(tx) = recorder.stop_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = recorder.join_handle.take() {
            let _ = handle.join();
        }
        recorder.active = false;

        let samples = recorder.buffer.lock().unwrap().drain();
        samples
    };

    let _ = app.emit("capture:state", "idle");

    if samples.len() < min_capture_samples() {
        info!(
            "Discarding capture of {} samples (below {}ms minimum)",
            samples.len(),
            MIN_CAPTURE_MS
        );
        return Ok(None);
    }

    let captures_dir = resolve_captures_dir(&app);
    let attachment = write_capture_wav(&samples, &captures_dir)?;
    info!(
        "Captured {}ms of audio ({})",
        attachment.duration_ms,
        crate::util::human_size(attachment.size_bytes)
    );

    // Replacing a previous capture releases its playback handle first.
    {
        let mut media = state.media.lock().unwrap();
        if let Some(old) = media.audio.take() {
            old.release();
        }
        media.audio = Some(attachment.clone());
    }

    let append_marker = state.settings.lock().unwrap().append_capture_markers;
    {
        let mut view = state.view.lock().unwrap();
        if append_marker {
            view.append_prompt_marker(AUDIO_PROMPT_MARKER);
        } else {
            view.note_media_edited();
        }
        let _ = app.emit("generation:state", view.clone());
    }

    let _ = app.emit("media:audio", Some(attachment.clone()));
    Ok(Some(attachment))
}

#[tauri::command]
pub(crate) fn clear_audio(app: AppHandle, state: State<'_, AppState>) {
    let cleared = clear_audio_slot(&state.media);
    if cleared {
        let mut view = state.view.lock().unwrap();
        view.note_media_edited();
        let _ = app.emit("generation:state", view.clone());
    }
    let _ = app.emit("media:audio", None::<AudioAttachment>);
}

/// Takes the audio slot and releases its handle. Idempotent: the second call
/// finds an empty slot and does nothing.
pub(crate) fn clear_audio_slot(media: &Mutex<MediaSlots>) -> bool {
    let taken = media.lock().unwrap().audio.take();
    match taken {
        Some(attachment) => {
            attachment.release();
            true
        }
        None => false,
    }
}

fn write_capture_wav(samples: &[i16], dir: &Path) -> Result<AudioAttachment, AppError> {
    let wav_path = dir.join(format!("capture_{}.wav", crate::util::now_ms()));

    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: TARGET_SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(&wav_path, spec)
        .map_err(|e| AppError::Storage(format!("Failed to create WAV file: {}", e)))?;
    for &sample in samples {
        writer
            .write_sample(sample)
            .map_err(|e| AppError::Storage(format!("Failed to write WAV sample: {}", e)))?;
    }
    writer
        .finalize()
        .map_err(|e| AppError::Storage(format!("Failed to finalize WAV: {}", e)))?;

    let size_bytes = std::fs::metadata(&wav_path).map(|m| m.len()).unwrap_or(0);
    Ok(AudioAttachment {
        wav_path,
        duration_ms: samples.len() as u64 * 1000 / TARGET_SAMPLE_RATE as u64,
        size_bytes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn float_to_i16_clamps_out_of_range() {
        assert_eq!(float_to_i16(2.0), i16::MAX);
        assert_eq!(float_to_i16(-2.0), -i16::MAX);
        assert_eq!(float_to_i16(0.0), 0);
    }

    #[test]
    fn push_samples_passthrough_at_target_rate() {
        let mut buffer = CaptureBuffer::default();
        buffer.push_samples(&[0.0, 0.5, -0.5], TARGET_SAMPLE_RATE);
        assert_eq!(buffer.drain().len(), 3);
    }

    #[test]
    fn push_samples_downsamples_to_target_rate() {
        let mut buffer = CaptureBuffer::default();
        let one_second = vec![0.1f32; 48_000];
        buffer.push_samples(&one_second, 48_000);
        let out = buffer.drain();
        let expected = TARGET_SAMPLE_RATE as usize;
        assert!(
            out.len().abs_diff(expected) < 16,
            "expected ~{} samples, got {}",
            expected,
            out.len()
        );
    }

    #[test]
    fn drain_resets_buffer() {
        let mut buffer = CaptureBuffer::default();
        buffer.push_samples(&[0.1, 0.2], TARGET_SAMPLE_RATE);
        assert_eq!(buffer.drain().len(), 2);
        assert!(buffer.drain().is_empty());
    }

    #[test]
    fn wav_write_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let samples: Vec<i16> = (0..TARGET_SAMPLE_RATE as i16).collect();
        let attachment = write_capture_wav(&samples, dir.path()).unwrap();

        assert_eq!(attachment.duration_ms, 1000);
        assert!(attachment.size_bytes > 0);

        let reader = hound::WavReader::open(&attachment.wav_path).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.channels, 1);
        assert_eq!(spec.sample_rate, TARGET_SAMPLE_RATE);
        assert_eq!(reader.len() as usize, samples.len());
    }

    #[test]
    fn clear_audio_slot_releases_exactly_once() {
        let dir = tempfile::tempdir().unwrap();
        let attachment = write_capture_wav(&[0i16; 4000], dir.path()).unwrap();
        let wav_path = attachment.wav_path.clone();
        assert!(wav_path.exists());

        let media = Mutex::new(MediaSlots {
            image: None,
            audio: Some(attachment),
        });

        assert!(clear_audio_slot(&media));
        assert!(!wav_path.exists());
        // Second clear is a no-op, not a double release.
        assert!(!clear_audio_slot(&media));
    }

    #[test]
    fn release_tolerates_missing_file() {
        let attachment = AudioAttachment {
            wav_path: PathBuf::from("/nonexistent/capture.wav"),
            duration_ms: 0,
            size_bytes: 0,
        };
        attachment.release();
    }
}
