use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Terminal outcome reported by the generation service. A missing `status`
/// field is the legacy success shape and maps to `Success`; an explicit
/// `status` always wins over legacy un-statused fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum GenerationStatus {
    Success,
    Blocked,
    Error,
}

/// Normalized display model built from one service response. Replaces the
/// previous result wholesale; nothing is merged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct GenerationResult {
    pub(crate) status: GenerationStatus,
    pub(crate) image_url: Option<String>,
    pub(crate) ethics_text: Option<String>,
    pub(crate) ethics_image: Option<String>,
    pub(crate) ethics_image_score: Option<f64>,
    pub(crate) uploaded_image_ethics: Option<String>,
    pub(crate) uploaded_image_ethics_score: Option<f64>,
    pub(crate) domain: Option<String>,
    pub(crate) enhanced_prompt: Option<String>,
    pub(crate) processing_time_seconds: Option<f64>,
    pub(crate) message: Option<String>,
}

/// Ordered extraction rules per field: the service has shipped both
/// stage-nested and flat root-level response shapes, and the nested key wins
/// when both are present. For the image a stage placeholder is accepted as a
/// last resort.
const IMAGE_URL_RULES: &[&[&str]] = &[
    &["image_generation", "image_url"],
    &["image_url"],
    &["image_generation", "placeholder"],
];
const ETHICS_TEXT_RULES: &[&[&str]] = &[&["ethics_check", "status"], &["ethics_text"], &["ethics"]];
const DOMAIN_RULES: &[&[&str]] = &[&["domain_classification", "domain"], &["domain"]];
const ENHANCED_PROMPT_RULES: &[&[&str]] = &[&["prompt_generation", "enhanced"], &["prompt"]];

fn lookup<'a>(raw: &'a Value, path: &[&str]) -> Option<&'a Value> {
    let mut node = raw;
    for key in path {
        node = node.get(key)?;
    }
    Some(node)
}

fn extract_str(raw: &Value, rules: &[&[&str]]) -> Option<String> {
    for path in rules {
        if let Some(value) = lookup(raw, path).and_then(Value::as_str) {
            if !value.trim().is_empty() {
                return Some(value.to_string());
            }
        }
    }
    None
}

fn extract_f64(raw: &Value, path: &[&str]) -> Option<f64> {
    lookup(raw, path).and_then(Value::as_f64)
}

fn parse_status(raw: &Value) -> GenerationStatus {
    match raw.get("status").and_then(Value::as_str) {
        Some("blocked") => GenerationStatus::Blocked,
        Some("error") => GenerationStatus::Error,
        // "success", unknown values and the legacy un-statused shape all
        // render as success; missing fields simply stay empty.
        _ => GenerationStatus::Success,
    }
}

/// Normalizes a raw service response into the single display model.
pub(crate) fn interpret(raw: &Value) -> GenerationResult {
    let status = parse_status(raw);

    // A blocked response is a normal terminal outcome: ethics/domain fields
    // are surfaced but no generated image is ever drawn.
    let image_url = if status == GenerationStatus::Blocked {
        None
    } else {
        extract_str(raw, IMAGE_URL_RULES)
    };

    GenerationResult {
        status,
        image_url,
        ethics_text: extract_str(raw, ETHICS_TEXT_RULES),
        ethics_image: extract_str(raw, &[&["ethics_image"]]),
        // Numeric scores are independently optional: a category label may
        // arrive without its score.
        ethics_image_score: extract_f64(raw, &["ethics_image_score"]),
        uploaded_image_ethics: extract_str(raw, &[&["uploaded_image_ethics"]]),
        uploaded_image_ethics_score: extract_f64(raw, &["uploaded_image_ethics_score"]),
        domain: extract_str(raw, DOMAIN_RULES),
        enhanced_prompt: extract_str(raw, ENHANCED_PROMPT_RULES),
        processing_time_seconds: extract_f64(raw, &["total_processing_time_seconds"]),
        message: extract_str(raw, &[&["message"]]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn nested_image_url_wins_over_flat() {
        let raw = json!({
            "image_generation": { "image_url": "X" },
            "image_url": "Y"
        });
        assert_eq!(interpret(&raw).image_url.as_deref(), Some("X"));
    }

    #[test]
    fn flat_image_url_is_accepted_alone() {
        let raw = json!({ "image_url": "Y" });
        assert_eq!(interpret(&raw).image_url.as_deref(), Some("Y"));
    }

    #[test]
    fn placeholder_is_last_resort() {
        let raw = json!({ "image_generation": { "placeholder": "P" } });
        assert_eq!(interpret(&raw).image_url.as_deref(), Some("P"));
    }

    #[test]
    fn absent_image_resolves_to_none_not_error() {
        let raw = json!({ "status": "success", "domain": "food" });
        let result = interpret(&raw);
        assert_eq!(result.status, GenerationStatus::Success);
        assert!(result.image_url.is_none());
    }

    #[test]
    fn blocked_surfaces_message_and_no_image() {
        let raw = json!({
            "status": "blocked",
            "message": "m",
            "ethics_text": "rejected",
            "image_url": "should-not-render"
        });
        let result = interpret(&raw);
        assert_eq!(result.status, GenerationStatus::Blocked);
        assert_eq!(result.message.as_deref(), Some("m"));
        assert_eq!(result.ethics_text.as_deref(), Some("rejected"));
        assert!(result.image_url.is_none());
    }

    #[test]
    fn explicit_error_status_is_kept() {
        let raw = json!({ "status": "error", "message": "boom" });
        let result = interpret(&raw);
        assert_eq!(result.status, GenerationStatus::Error);
        assert_eq!(result.message.as_deref(), Some("boom"));
    }

    #[test]
    fn missing_status_is_treated_as_success_shape() {
        let raw = json!({
            "image_generation": { "image_url": "data:image/png;base64,AAAA" },
            "ethics_check": { "status": "passed" },
            "domain_classification": { "domain": "nature" },
            "prompt_generation": { "enhanced": "better" },
            "total_processing_time_seconds": 42.5
        });
        let result = interpret(&raw);
        assert_eq!(result.status, GenerationStatus::Success);
        assert_eq!(result.ethics_text.as_deref(), Some("passed"));
        assert_eq!(result.domain.as_deref(), Some("nature"));
        assert_eq!(result.enhanced_prompt.as_deref(), Some("better"));
        assert_eq!(result.processing_time_seconds, Some(42.5));
    }

    #[test]
    fn explicit_status_wins_over_legacy_fields() {
        // Both a status and legacy success fields present: status wins.
        let raw = json!({ "status": "blocked", "image_url": "Y", "prompt": "p" });
        let result = interpret(&raw);
        assert_eq!(result.status, GenerationStatus::Blocked);
        assert!(result.image_url.is_none());
        assert_eq!(result.enhanced_prompt.as_deref(), Some("p"));
    }

    #[test]
    fn ethics_fallback_chain() {
        let raw = json!({ "ethics": "passed" });
        assert_eq!(interpret(&raw).ethics_text.as_deref(), Some("passed"));

        let raw = json!({ "ethics": "x", "ethics_text": "passed" });
        assert_eq!(interpret(&raw).ethics_text.as_deref(), Some("passed"));
    }

    #[test]
    fn scores_are_independently_optional() {
        let raw = json!({ "uploaded_image_ethics": "ethique" });
        let result = interpret(&raw);
        assert_eq!(result.uploaded_image_ethics.as_deref(), Some("ethique"));
        assert!(result.uploaded_image_ethics_score.is_none());

        let raw = json!({ "ethics_image": "ethique", "ethics_image_score": 0.97 });
        let result = interpret(&raw);
        assert_eq!(result.ethics_image.as_deref(), Some("ethique"));
        assert_eq!(result.ethics_image_score, Some(0.97));
    }

    #[test]
    fn red_fox_success_scenario() {
        let raw = json!({
            "status": "success",
            "image_url": "data:image/png;base64,Zm94",
            "domain": "nature",
            "prompt": "a red fox, highly detailed"
        });
        let result = interpret(&raw);
        assert_eq!(result.status, GenerationStatus::Success);
        assert_eq!(result.image_url.as_deref(), Some("data:image/png;base64,Zm94"));
        assert_eq!(result.domain.as_deref(), Some("nature"));
        assert_eq!(
            result.enhanced_prompt.as_deref(),
            Some("a red fox, highly detailed")
        );
        assert!(result.ethics_image.is_none());
        assert!(result.ethics_image_score.is_none());
    }
}
