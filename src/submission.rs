use crate::errors::AppError;

/// The two request shapes the generation service accepts. Presence of an
/// image attachment routes to the edit variant, its absence to generate,
/// regardless of what else is staged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SubmissionTarget {
    Generate,
    EditImage,
}

impl SubmissionTarget {
    pub(crate) fn path(&self) -> &'static str {
        match self {
            SubmissionTarget::Generate => "/generate",
            SubmissionTarget::EditImage => "/edit_image",
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct ImagePayload {
    pub(crate) file_name: String,
    pub(crate) mime: String,
    pub(crate) bytes: Vec<u8>,
}

#[derive(Debug, Clone)]
pub(crate) struct AudioPayload {
    pub(crate) bytes: Vec<u8>,
}

/// One multipart request, assembled fresh per generate action.
#[derive(Debug, Clone)]
pub(crate) struct Submission {
    pub(crate) target: SubmissionTarget,
    pub(crate) text: String,
    pub(crate) image: Option<ImagePayload>,
    pub(crate) audio: Option<AudioPayload>,
}

/// Assembles the request from whatever is currently staged.
///
/// Fails with `InvalidRequest` before any network I/O when there is nothing
/// to send. The edit variant does not carry audio; the `description` field
/// is attached even when empty, matching the service contract.
pub(crate) fn build_submission(
    prompt: &str,
    image: Option<ImagePayload>,
    audio: Option<AudioPayload>,
) -> Result<Submission, AppError> {
    if prompt.trim().is_empty() && image.is_none() && audio.is_none() {
        return Err(AppError::InvalidRequest(
            "Enter a prompt, record audio or attach an image".to_string(),
        ));
    }

    if image.is_some() {
        return Ok(Submission {
            target: SubmissionTarget::EditImage,
            text: prompt.to_string(),
            image,
            audio: None,
        });
    }

    Ok(Submission {
        target: SubmissionTarget::Generate,
        text: prompt.to_string(),
        image: None,
        audio,
    })
}
