use crate::audio::{AudioAttachment, Recorder};
use crate::constants::{
  CONNECT_TIMEOUT_SECS_DEFAULT, CONNECT_TIMEOUT_SECS_MAX, DEFAULT_BASE_URL,
  REQUEST_TIMEOUT_SECS_DEFAULT, REQUEST_TIMEOUT_SECS_MAX, REQUEST_TIMEOUT_SECS_MIN,
};
use crate::interpret::{GenerationResult, GenerationStatus};
use crate::media::ImageAttachment;
use crate::paths::resolve_config_path;
use serde::{Deserialize, Serialize};
use std::fs;
use std::sync::atomic::AtomicU64;
use std::sync::Mutex;
use tauri::AppHandle;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct Settings {
  pub(crate) base_url: String,
  pub(crate) input_device: String,
  pub(crate) connect_timeout_secs: u64,
  pub(crate) request_timeout_secs: u64,
  pub(crate) append_capture_markers: bool,
}

impl Default for Settings {
  fn default() -> Self {
    Self {
      base_url: DEFAULT_BASE_URL.to_string(),
      input_device: "default".to_string(),
      connect_timeout_secs: CONNECT_TIMEOUT_SECS_DEFAULT,
      request_timeout_secs: REQUEST_TIMEOUT_SECS_DEFAULT,
      append_capture_markers: true,
    }
  }
}

/// Clamps persisted settings back into valid ranges. Applied on load and on
/// every save, so a hand-edited settings.json cannot wedge the app.
pub(crate) fn sanitize_settings(mut settings: Settings) -> Settings {
  let url_ok = url::Url::parse(settings.base_url.trim())
    .map(|u| matches!(u.scheme(), "http" | "https"))
    .unwrap_or(false);
  if !url_ok {
    settings.base_url = DEFAULT_BASE_URL.to_string();
  } else {
    settings.base_url = settings.base_url.trim().trim_end_matches('/').to_string();
  }

  if settings.input_device.trim().is_empty() {
    settings.input_device = "default".to_string();
  }
  settings.connect_timeout_secs = settings.connect_timeout_secs.clamp(1, CONNECT_TIMEOUT_SECS_MAX);
  settings.request_timeout_secs = settings
    .request_timeout_secs
    .clamp(REQUEST_TIMEOUT_SECS_MIN, REQUEST_TIMEOUT_SECS_MAX);
  settings
}

pub(crate) fn load_settings(app: &AppHandle) -> Settings {
  let path = resolve_config_path(app, "settings.json");
  match fs::read_to_string(path) {
    Ok(raw) => sanitize_settings(serde_json::from_str(&raw).unwrap_or_default()),
    Err(_) => Settings::default(),
  }
}

pub(crate) fn save_settings_file(app: &AppHandle, settings: &Settings) -> Result<(), String> {
  let path = resolve_config_path(app, "settings.json");
  let raw = serde_json::to_string_pretty(settings).map_err(|e| e.to_string())?;
  fs::write(path, raw).map_err(|e| e.to_string())?;
  Ok(())
}

/// Staged media. The image and audio slots are independent: the original
/// service accepts audio alongside text, while an image reroutes the whole
/// submission to the edit variant.
#[derive(Default)]
pub(crate) struct MediaSlots {
  pub(crate) image: Option<ImageAttachment>,
  pub(crate) audio: Option<AudioAttachment>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum Phase {
  Idle,
  Submitting,
  Success,
  Blocked,
  Error,
}

/// Snapshot of everything the single page renders. Emitted whole on every
/// transition (`generation:state`); the frontend never patches it.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct ViewModel {
  pub(crate) phase: Phase,
  pub(crate) prompt: String,
  pub(crate) active_tab: String,
  pub(crate) result: Option<GenerationResult>,
  pub(crate) message: Option<String>,
}

impl ViewModel {
  pub(crate) fn new() -> Self {
    Self {
      phase: Phase::Idle,
      prompt: String::new(),
      active_tab: "Text".to_string(),
      result: None,
      message: None,
    }
  }

  /// Any new input makes a terminal result stale for display purposes. The
  /// result record itself survives until the next submission starts.
  fn invalidate_terminal(&mut self) {
    if matches!(self.phase, Phase::Success | Phase::Blocked | Phase::Error) {
      self.phase = Phase::Idle;
    }
  }

  pub(crate) fn set_prompt(&mut self, prompt: String) {
    self.prompt = prompt;
    self.invalidate_terminal();
  }

  pub(crate) fn append_prompt_marker(&mut self, marker: &str) {
    self.prompt.push_str(marker);
    self.invalidate_terminal();
  }

  pub(crate) fn note_media_edited(&mut self) {
    self.invalidate_terminal();
  }

  /// Prior result and message are cleared at transition start, not at
  /// transition end, so stale content never flickers while submitting.
  pub(crate) fn begin_submission(&mut self) {
    self.phase = Phase::Submitting;
    self.result = None;
    self.message = None;
  }

  pub(crate) fn complete(&mut self, result: GenerationResult) {
    self.phase = match result.status {
      GenerationStatus::Success => Phase::Success,
      GenerationStatus::Blocked => Phase::Blocked,
      GenerationStatus::Error => Phase::Error,
    };
    self.message = result.message.clone();
    self.result = Some(result);
  }

  pub(crate) fn fail(&mut self, message: String) {
    self.phase = Phase::Error;
    self.message = Some(message);
    self.result = None;
  }
}

pub(crate) struct AppState {
  pub(crate) settings: Mutex<Settings>,
  pub(crate) recorder: Mutex<Recorder>,
  pub(crate) media: Mutex<MediaSlots>,
  pub(crate) view: Mutex<ViewModel>,
  /// Monotonically increasing submission sequence; a response is applied
  /// only while its sequence is still the latest one issued.
  pub(crate) submission_seq: AtomicU64,
}

impl AppState {
  pub(crate) fn new(settings: Settings) -> Self {
    Self {
      settings: Mutex::new(settings),
      recorder: Mutex::new(Recorder::new()),
      media: Mutex::new(MediaSlots::default()),
      view: Mutex::new(ViewModel::new()),
      submission_seq: AtomicU64::new(0),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn success_result() -> GenerationResult {
    GenerationResult {
      status: GenerationStatus::Success,
      image_url: Some("data:image/png;base64,AAAA".to_string()),
      ethics_text: Some("passed".to_string()),
      ethics_image: None,
      ethics_image_score: None,
      uploaded_image_ethics: None,
      uploaded_image_ethics_score: None,
      domain: Some("nature".to_string()),
      enhanced_prompt: Some("a red fox, highly detailed".to_string()),
      processing_time_seconds: None,
      message: None,
    }
  }

  #[test]
  fn sanitize_rejects_bad_base_url() {
    let settings = sanitize_settings(Settings {
      base_url: "not a url".to_string(),
      ..Settings::default()
    });
    assert_eq!(settings.base_url, DEFAULT_BASE_URL);

    let settings = sanitize_settings(Settings {
      base_url: "ftp://example.com".to_string(),
      ..Settings::default()
    });
    assert_eq!(settings.base_url, DEFAULT_BASE_URL);
  }

  #[test]
  fn sanitize_trims_trailing_slash() {
    let settings = sanitize_settings(Settings {
      base_url: "http://10.0.0.2:9000/".to_string(),
      ..Settings::default()
    });
    assert_eq!(settings.base_url, "http://10.0.0.2:9000");
  }

  #[test]
  fn sanitize_clamps_timeouts() {
    let settings = sanitize_settings(Settings {
      connect_timeout_secs: 0,
      request_timeout_secs: 100_000,
      ..Settings::default()
    });
    assert_eq!(settings.connect_timeout_secs, 1);
    assert_eq!(settings.request_timeout_secs, REQUEST_TIMEOUT_SECS_MAX);
  }

  #[test]
  fn begin_submission_clears_prior_result() {
    let mut view = ViewModel::new();
    view.complete(success_result());
    assert_eq!(view.phase, Phase::Success);
    assert!(view.result.is_some());

    view.begin_submission();
    assert_eq!(view.phase, Phase::Submitting);
    assert!(view.result.is_none());
    assert!(view.message.is_none());
  }

  #[test]
  fn prompt_edit_returns_terminal_phase_to_idle_but_keeps_result() {
    let mut view = ViewModel::new();
    view.complete(success_result());

    view.set_prompt("something new".to_string());
    assert_eq!(view.phase, Phase::Idle);
    // Stale for display, but the record is only cleared on next submit.
    assert!(view.result.is_some());
  }

  #[test]
  fn media_edit_invalidates_blocked_phase() {
    let mut view = ViewModel::new();
    let mut blocked = success_result();
    blocked.status = GenerationStatus::Blocked;
    view.complete(blocked);
    assert_eq!(view.phase, Phase::Blocked);

    view.note_media_edited();
    assert_eq!(view.phase, Phase::Idle);
  }

  #[test]
  fn edit_while_submitting_does_not_change_phase() {
    let mut view = ViewModel::new();
    view.begin_submission();
    view.set_prompt("late edit".to_string());
    assert_eq!(view.phase, Phase::Submitting);
  }

  #[test]
  fn complete_blocked_carries_message() {
    let mut view = ViewModel::new();
    let mut blocked = success_result();
    blocked.status = GenerationStatus::Blocked;
    blocked.message = Some("refused".to_string());
    view.complete(blocked);
    assert_eq!(view.phase, Phase::Blocked);
    assert_eq!(view.message.as_deref(), Some("refused"));
  }
}
