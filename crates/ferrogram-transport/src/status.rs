use serde_json::Value;

use ferrogram_core::{ApiError, ApiResult};

/// Longest body excerpt kept in an error description.
const MAX_EXCERPT: usize = 200;

/// Decides whether an HTTP response carries an API envelope.
///
/// The platform answers API-level failures with a non-2xx status *and* a JSON
/// envelope; those bodies are passed through so that envelope decoding can
/// classify them (and pick up `retry_after`). Anything else that is not a
/// success (a proxy's HTML error page, an empty 502, ...) becomes an error
/// built from the status code alone.
pub fn classify_response(status: u16, body: Vec<u8>) -> ApiResult<Vec<u8>> {
    if (200..300).contains(&status) || is_envelope(&body) {
        return Ok(body);
    }

    let text = String::from_utf8_lossy(&body);
    let excerpt: String = text.trim().chars().take(MAX_EXCERPT).collect();
    let description = if excerpt.is_empty() {
        format!("HTTP {status}")
    } else {
        format!("HTTP {status}: {excerpt}")
    };
    Err(ApiError::from_code(i64::from(status), description))
}

fn is_envelope(body: &[u8]) -> bool {
    serde_json::from_slice::<Value>(body)
        .ok()
        .is_some_and(|v| v.get("ok").is_some_and(Value::is_boolean))
}
