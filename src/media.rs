use crate::errors::AppError;
use crate::state::AppState;
use base64::Engine;
use image::ImageFormat;
use std::path::{Path, PathBuf};
use std::thread;
use tauri::{AppHandle, Emitter, Manager, State};
use tracing::{info, warn};

/// Staged image file. `preview` is a base64 data URL derived off-thread
/// strictly after the file reference is stored; callers must not assume it
/// is present.
#[derive(Debug, Clone, serde::Serialize)]
pub(crate) struct ImageAttachment {
    pub(crate) path: PathBuf,
    pub(crate) file_name: String,
    pub(crate) mime: String,
    pub(crate) size_bytes: u64,
    pub(crate) preview: Option<String>,
}

fn mime_for_format(format: ImageFormat) -> Option<&'static str> {
    match format {
        ImageFormat::Png => Some("image/png"),
        ImageFormat::Jpeg => Some("image/jpeg"),
        ImageFormat::Gif => Some("image/gif"),
        ImageFormat::WebP => Some("image/webp"),
        ImageFormat::Bmp => Some("image/bmp"),
        ImageFormat::Tiff => Some("image/tiff"),
        ImageFormat::Ico => Some("image/x-icon"),
        _ => None,
    }
}

pub(crate) fn data_url(mime: &str, bytes: &[u8]) -> String {
    format!(
        "data:{};base64,{}",
        mime,
        base64::engine::general_purpose::STANDARD.encode(bytes)
    )
}

/// Reads and content-sniffs a candidate file. Rejection leaves whatever was
/// previously attached untouched; the caller only swaps slots on Ok.
pub(crate) fn load_image_attachment(path: &Path) -> Result<(ImageAttachment, Vec<u8>), AppError> {
    let bytes = std::fs::read(path)
        .map_err(|e| AppError::Storage(format!("Could not read {}: {}", path.display(), e)))?;

    let format = image::guess_format(&bytes).map_err(|_| {
        AppError::InvalidFileType(format!("{} is not an image file", path.display()))
    })?;
    let mime = mime_for_format(format).ok_or_else(|| {
        AppError::InvalidFileType(format!("Unsupported image format in {}", path.display()))
    })?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "image".to_string());

    Ok((
        ImageAttachment {
            path: path.to_path_buf(),
            file_name,
            mime: mime.to_string(),
            size_bytes: bytes.len() as u64,
            preview: None,
        },
        bytes,
    ))
}

#[tauri::command]
pub(crate) fn pick_image() -> Option<String> {
    rfd::FileDialog::new()
        .add_filter("Images", &["png", "jpg", "jpeg", "gif", "webp", "bmp"])
        .pick_file()
        .map(|path| path.to_string_lossy().to_string())
}

#[tauri::command]
pub(crate) fn select_image(
    app: AppHandle,
    state: State<'_, AppState>,
    path: String,
) -> Result<ImageAttachment, AppError> {
    let path = PathBuf::from(path);
    let (attachment, bytes) = load_image_attachment(&path)?;
    info!(
        "Selected image '{}' ({}, {})",
        attachment.file_name,
        attachment.mime,
        crate::util::human_size(attachment.size_bytes)
    );

    {
        let mut media = state.media.lock().unwrap();
        // The old attachment (and its preview handle) drops here.
        media.image = Some(attachment.clone());
    }

    let append_marker = state.settings.lock().unwrap().append_capture_markers;
    {
        let mut view = state.view.lock().unwrap();
        if append_marker {
            view.append_prompt_marker(&format!(" [Image: {}]", attachment.file_name));
        } else {
            view.note_media_edited();
        }
        let _ = app.emit("generation:state", view.clone());
    }

    let _ = app.emit("media:image", Some(attachment.clone()));

    // Phase two: derive the preview off-thread and attach it only if the
    // slot still holds the same file.
    let preview_path = attachment.path.clone();
    let mime = attachment.mime.clone();
    thread::spawn(move || {
        let url = data_url(&mime, &bytes);
        let state = app.state::<AppState>();
        let mut media = state.media.lock().unwrap();
        match media.image.as_mut() {
            Some(current) if current.path == preview_path => {
                current.preview = Some(url);
                let _ = app.emit("media:image-preview", Some(current.clone()));
            }
            _ => warn!("Image changed before its preview was ready, dropping it"),
        }
    });

    Ok(attachment)
}

#[tauri::command]
pub(crate) fn clear_image(app: AppHandle, state: State<'_, AppState>) {
    let had_image = state.media.lock().unwrap().image.take().is_some();
    if had_image {
        let mut view = state.view.lock().unwrap();
        view.note_media_edited();
        let _ = app.emit("generation:state", view.clone());
    }
    let _ = app.emit("media:image", None::<ImageAttachment>);
}
