use crate::client::GeneratorClient;
use crate::errors::AppError;
use crate::interpret::{interpret, GenerationResult};
use crate::state::{AppState, Phase, Settings, ViewModel};
use crate::submission::{build_submission, AudioPayload, ImagePayload, Submission};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::thread;
use std::time::Duration;
use tauri::{AppHandle, Emitter, Manager, State};
use tracing::{info, warn};

/// Kicks off one generation. Rejections (empty submission, one already in
/// flight) happen synchronously before any network I/O; the call itself runs
/// on a worker thread and reports back through `generation:state`.
#[tauri::command]
pub(crate) fn generate(app: AppHandle, state: State<'_, AppState>) -> Result<u64, AppError> {
    let prompt = {
        let view = state.view.lock().unwrap();
        if view.phase == Phase::Submitting {
            // The trigger is disabled while submitting; a second attempt is
            // a race we refuse rather than queue.
            return Err(AppError::InvalidRequest(
                "A generation is already in progress".to_string(),
            ));
        }
        view.prompt.clone()
    };

    let (image, audio) = stage_payloads(&state)?;
    let submission = build_submission(&prompt, image, audio)?;

    let seq = state.submission_seq.fetch_add(1, Ordering::AcqRel) + 1;
    info!("Starting submission #{} ({:?})", seq, submission.target);

    {
        let mut view = state.view.lock().unwrap();
        view.begin_submission();
        let _ = app.emit("generation:state", view.clone());
    }

    let settings = state.settings.lock().unwrap().clone();
    let worker_app = app.clone();
    thread::spawn(move || {
        let outcome = run_submission(&settings, submission);
        let state = worker_app.state::<AppState>();

        if apply_outcome(&state.view, &state.submission_seq, seq, &outcome) {
            let view = state.view.lock().unwrap().clone();
            let _ = worker_app.emit("generation:state", view);
            if let Err(err) = outcome {
                crate::emit_error(&worker_app, err, Some("Generate"));
            }
        } else {
            warn!("Discarding stale response for submission #{}", seq);
        }
    });

    Ok(seq)
}

/// Reads staged attachment bytes at submit time. A vanished file is a
/// storage error surfaced before the request leaves the machine.
fn stage_payloads(
    state: &State<'_, AppState>,
) -> Result<(Option<ImagePayload>, Option<AudioPayload>), AppError> {
    let media = state.media.lock().unwrap();

    let image = media
        .image
        .as_ref()
        .map(|img| -> Result<ImagePayload, AppError> {
            let bytes = std::fs::read(&img.path).map_err(|e| {
                AppError::Storage(format!("Could not read {}: {}", img.path.display(), e))
            })?;
            Ok(ImagePayload {
                file_name: img.file_name.clone(),
                mime: img.mime.clone(),
                bytes,
            })
        })
        .transpose()?;

    let audio = media
        .audio
        .as_ref()
        .map(|capture| -> Result<AudioPayload, AppError> {
            let bytes = std::fs::read(&capture.wav_path).map_err(|e| {
                AppError::Storage(format!(
                    "Could not read {}: {}",
                    capture.wav_path.display(),
                    e
                ))
            })?;
            Ok(AudioPayload { bytes })
        })
        .transpose()?;

    Ok((image, audio))
}

fn run_submission(
    settings: &Settings,
    submission: Submission,
) -> Result<GenerationResult, AppError> {
    let client = GeneratorClient::new(
        &settings.base_url,
        Duration::from_secs(settings.connect_timeout_secs),
        Duration::from_secs(settings.request_timeout_secs),
    )?;
    let raw = client.submit(submission)?;
    Ok(interpret(&raw))
}

/// Applies a finished submission to the view, unless a newer submission has
/// been issued since; stale responses must never mutate visible state.
pub(crate) fn apply_outcome(
    view: &Mutex<ViewModel>,
    seq_counter: &AtomicU64,
    seq: u64,
    outcome: &Result<GenerationResult, AppError>,
) -> bool {
    if seq_counter.load(Ordering::Acquire) != seq {
        return false;
    }

    let mut view = view.lock().unwrap();
    match outcome {
        Ok(result) => view.complete(result.clone()),
        Err(err) => view.fail(err.message().to_string()),
    }
    true
}
