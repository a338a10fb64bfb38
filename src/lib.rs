// Atelier - prompt-to-image desktop client
mod audio;
mod client;
mod constants;
mod errors;
mod generation;
mod interpret;
mod media;
mod paths;
mod state;
mod submission;
mod util;

use errors::{AppError, ErrorEvent};
use state::{AppState, Settings, ViewModel};
use tauri::{AppHandle, Emitter, Manager, State};
use tracing::{error, info};

use crate::audio::{clear_audio, list_audio_devices, start_audio_capture, stop_audio_capture};
use crate::generation::generate;
use crate::media::{clear_image, pick_image, select_image};
use crate::state::{load_settings, sanitize_settings, save_settings_file};

fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .init();

    info!("Atelier starting up");
}

pub(crate) fn emit_error(app: &AppHandle, error: AppError, context: Option<&str>) {
    let event = if let Some(ctx) = context {
        ErrorEvent::new(error.clone()).with_context(ctx)
    } else {
        ErrorEvent::new(error.clone())
    };

    error!("{}: {}", error.title(), error.message());

    let _ = app.emit("app:error", event);
}

#[tauri::command]
fn get_settings(state: State<'_, AppState>) -> Settings {
    state.settings.lock().unwrap().clone()
}

#[tauri::command]
fn save_settings(
    app: AppHandle,
    state: State<'_, AppState>,
    settings: Settings,
) -> Result<(), String> {
    let settings = sanitize_settings(settings);
    save_settings_file(&app, &settings)?;

    *state.settings.lock().unwrap() = settings.clone();
    info!("Settings saved (service at {})", settings.base_url);

    let _ = app.emit("settings-changed", settings);
    Ok(())
}

#[tauri::command]
fn get_view(state: State<'_, AppState>) -> ViewModel {
    state.view.lock().unwrap().clone()
}

#[tauri::command]
fn set_prompt(app: AppHandle, state: State<'_, AppState>, prompt: String) {
    let mut view = state.view.lock().unwrap();
    view.set_prompt(prompt);
    let _ = app.emit("generation:state", view.clone());
}

#[tauri::command]
fn set_active_tab(app: AppHandle, state: State<'_, AppState>, tab: String) {
    let mut view = state.view.lock().unwrap();
    view.active_tab = tab;
    let _ = app.emit("generation:state", view.clone());
}

pub fn run() {
    init_logging();

    tauri::Builder::default()
        .setup(|app| {
            let settings = load_settings(app.handle());
            info!("Generation service endpoint: {}", settings.base_url);

            app.manage(AppState::new(settings));

            let _ = app.emit("capture:state", "idle");
            Ok(())
        })
        .invoke_handler(tauri::generate_handler![
            get_settings,
            save_settings,
            get_view,
            set_prompt,
            set_active_tab,
            generate,
            start_audio_capture,
            stop_audio_capture,
            clear_audio,
            list_audio_devices,
            pick_image,
            select_image,
            clear_image,
        ])
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}
