use crate::errors::AppError;
use crate::submission::{Submission, SubmissionTarget};
use reqwest::blocking::multipart::{Form, Part};
use std::time::Duration;
use tracing::info;

/// HTTP client for the generation service. The base URL is injected at
/// construction (it lives in Settings), never read from ambient state, so
/// tests can point it at a loopback double.
pub(crate) struct GeneratorClient {
    base_url: String,
    http: reqwest::blocking::Client,
}

impl GeneratorClient {
    pub(crate) fn new(
        base_url: &str,
        connect_timeout: Duration,
        request_timeout: Duration,
    ) -> Result<Self, AppError> {
        let http = reqwest::blocking::Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(request_timeout)
            .build()
            .map_err(|e| AppError::Other(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    /// Performs the single network call for a submission and parses the body
    /// as JSON. Failures map to `Network` (connect/timeout/read) or `Decode`
    /// (non-JSON body); no retry is performed.
    pub(crate) fn submit(&self, submission: Submission) -> Result<serde_json::Value, AppError> {
        let url = format!("{}{}", self.base_url, submission.target.path());
        let form = build_form(&submission)?;

        info!("Submitting {:?} request to {}", submission.target, url);

        let response = self
            .http
            .post(&url)
            .multipart(form)
            .send()
            .map_err(map_transport_error)?;

        let status = response.status();
        let body = response.text().map_err(map_transport_error)?;

        serde_json::from_str(&body).map_err(|e| {
            AppError::Decode(format!(
                "Service returned HTTP {} with a non-JSON body: {}",
                status, e
            ))
        })
    }
}

fn build_form(submission: &Submission) -> Result<Form, AppError> {
    let mut form = Form::new();

    match submission.target {
        SubmissionTarget::EditImage => {
            let image = submission
                .image
                .as_ref()
                .ok_or_else(|| AppError::InvalidRequest("Edit requires an image".to_string()))?;
            let part = Part::bytes(image.bytes.clone())
                .file_name(image.file_name.clone())
                .mime_str(&image.mime)
                .map_err(|e| AppError::Other(format!("Invalid image mime type: {}", e)))?;
            form = form
                .part("file", part)
                .text("description", submission.text.clone());
        }
        SubmissionTarget::Generate => {
            if !submission.text.trim().is_empty() {
                form = form.text("text", submission.text.clone());
            }
            if let Some(audio) = submission.audio.as_ref() {
                let part = Part::bytes(audio.bytes.clone())
                    .file_name("recording.wav")
                    .mime_str("audio/wav")
                    .map_err(|e| AppError::Other(format!("Invalid audio mime type: {}", e)))?;
                form = form.part("audio", part);
            }
        }
    }

    Ok(form)
}

fn map_transport_error(e: reqwest::Error) -> AppError {
    if e.is_timeout() {
        AppError::Network("The generation service did not respond in time".to_string())
    } else if e.is_connect() {
        AppError::Network(format!("Could not reach the generation service: {}", e))
    } else {
        AppError::Network(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::submission::build_submission;

    #[test]
    fn trailing_slash_is_normalized() {
        let client = GeneratorClient::new(
            "http://127.0.0.1:8000/",
            Duration::from_secs(1),
            Duration::from_secs(1),
        )
        .unwrap();
        assert_eq!(client.base_url, "http://127.0.0.1:8000");
    }

    // --- Unreachable endpoint maps to Network, never a panic ---
    #[test]
    fn submit_returns_network_error_on_unreachable_endpoint() {
        let client = GeneratorClient::new(
            "http://127.0.0.1:19999",
            Duration::from_secs(1),
            Duration::from_secs(2),
        )
        .unwrap();
        let submission = build_submission("a red fox", None, None).unwrap();
        let result = client.submit(submission);
        assert!(
            matches!(result, Err(AppError::Network(_))),
            "expected Network error for unreachable endpoint, got: {:?}",
            result
        );
    }

    #[test]
    fn form_builds_for_both_variants() {
        let submission = build_submission("a red fox", None, None).unwrap();
        assert!(build_form(&submission).is_ok());

        let image = crate::submission::ImagePayload {
            file_name: "photo.png".to_string(),
            mime: "image/png".to_string(),
            bytes: vec![0x89, b'P', b'N', b'G'],
        };
        let submission = build_submission("edit me", Some(image), None).unwrap();
        assert!(build_form(&submission).is_ok());
    }
}
