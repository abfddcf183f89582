//! Capture ingest handler
//!
//! Handles POST /capture requests: decodes the submitted data-URL PNG payload
//! and persists it as one timestamped artifact in the caller's visitor folder.

use axum::{extract::State, Extension, Json};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::resolver::ResolvedVisitor;
use crate::state::AppState;

/// Data-URL scheme prefix stripped before base64 decoding.
const DATA_URL_PREFIX: &str = "data:image/png;base64,";

/// Request body for POST /capture
#[derive(Debug, Deserialize)]
pub struct CaptureRequest {
    /// Data-URL-encoded PNG snapshot
    #[serde(default)]
    pub image: Option<String>,
}

/// Response for a persisted capture
#[derive(Debug, Serialize)]
pub struct CaptureResponse {
    pub success: bool,
}

/// POST /capture - persist one snapshot into the visitor's folder
///
/// Returns `400 {"error": "No image"}` when the payload is absent; a valid
/// payload yields exactly one new `.png` file and `200 {"success": true}`.
pub async fn capture_handler(
    State(state): State<AppState>,
    Extension(visitor): Extension<ResolvedVisitor>,
    Json(request): Json<CaptureRequest>,
) -> Result<Json<CaptureResponse>, ApiError> {
    let image = match request.image.as_deref() {
        Some(image) if !image.is_empty() => image,
        _ => return Err(ApiError::bad_request("No image")),
    };

    let bytes = decode_data_url(image)?;
    state.store.save_capture(&visitor.folder_name, &bytes).await?;

    Ok(Json(CaptureResponse { success: true }))
}

/// Strip the PNG data-URL prefix (when present) and decode the base64 payload.
fn decode_data_url(image: &str) -> Result<Vec<u8>, ApiError> {
    let payload = image.strip_prefix(DATA_URL_PREFIX).unwrap_or(image);
    BASE64
        .decode(payload)
        .map_err(|e| ApiError::bad_request(format!("Invalid image data: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_strips_prefix() {
        let payload = format!("{}{}", DATA_URL_PREFIX, BASE64.encode(b"png-bytes"));
        assert_eq!(decode_data_url(&payload).unwrap(), b"png-bytes");
    }

    #[test]
    fn test_decode_bare_base64() {
        let payload = BASE64.encode(b"raw");
        assert_eq!(decode_data_url(&payload).unwrap(), b"raw");
    }

    #[test]
    fn test_decode_rejects_invalid_base64() {
        assert!(decode_data_url("data:image/png;base64,!!!not-base64!!!").is_err());
    }
}
