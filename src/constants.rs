pub const TARGET_SAMPLE_RATE: u32 = 16_000;

/// Captures shorter than this are discarded instead of attached.
pub const MIN_CAPTURE_MS: u64 = 200;

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000";
pub const CONNECT_TIMEOUT_SECS_DEFAULT: u64 = 5;
// Generation regularly takes 30-60s on a CPU-only service.
pub const REQUEST_TIMEOUT_SECS_DEFAULT: u64 = 120;
pub const CONNECT_TIMEOUT_SECS_MAX: u64 = 60;
pub const REQUEST_TIMEOUT_SECS_MIN: u64 = 5;
pub const REQUEST_TIMEOUT_SECS_MAX: u64 = 600;

pub const AUDIO_PROMPT_MARKER: &str = " [Audio recorded]";
