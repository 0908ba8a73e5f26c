//! # Request Extractors
//!
//! [`UploadBody`] reads the body of `POST /v1/attachment`, which is either a
//! `multipart/form-data` request carrying a `file` part or a JSON document.

use axum::body::Bytes;
use axum::extract::{FromRequest, Multipart, Request};
use axum::http::{header, StatusCode};
use serde::de::DeserializeOwned;

use crate::error::AppError;

/// Longest filename the metadata table accepts (`VARCHAR(255)`).
pub const MAX_FILENAME_CHARS: usize = 255;

/// Body of an upload request.
#[derive(Debug, Clone, PartialEq)]
pub enum UploadBody {
    /// A `file` part of a multipart form.
    File { filename: String, bytes: Vec<u8> },
    /// A JSON document.
    Json(serde_json::Value),
    /// No file part and no body.
    Empty,
}

fn rejection(status: StatusCode, text: String) -> AppError {
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(text)
    } else {
        AppError::BadRequest(text)
    }
}

fn is_multipart(req: &Request) -> bool {
    req.headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("multipart/form-data"))
}

#[axum::async_trait]
impl<S: Send + Sync> FromRequest<S> for UploadBody {
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        if is_multipart(&req) {
            let mut multipart = Multipart::from_request(req, state)
                .await
                .map_err(|e| rejection(e.status(), e.body_text()))?;
            while let Some(field) = multipart
                .next_field()
                .await
                .map_err(|e| rejection(e.status(), e.body_text()))?
            {
                if field.name() != Some("file") {
                    continue;
                }
                let filename = match field.file_name() {
                    Some(name) if !name.is_empty() => name.to_string(),
                    _ => return Err(AppError::BadRequest("file part has no filename".into())),
                };
                if filename.chars().count() > MAX_FILENAME_CHARS {
                    return Err(AppError::BadRequest(format!(
                        "filename is longer than {MAX_FILENAME_CHARS} characters"
                    )));
                }
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| rejection(e.status(), e.body_text()))?;
                return Ok(Self::File {
                    filename,
                    bytes: bytes.to_vec(),
                });
            }
            return Ok(Self::Empty);
        }

        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|e| rejection(e.status(), e.body_text()))?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::Empty);
        }
        serde_json::from_slice(&bytes)
            .map(Self::Json)
            .map_err(|e| AppError::BadRequest(format!("body is not valid JSON: {e}")))
    }
}

/// Deserialize an already parsed JSON value, mapping failures to
/// [`AppError::BadRequest`] with `context` as the message.
pub fn from_json_value<T: DeserializeOwned>(
    value: serde_json::Value,
    context: &str,
) -> Result<T, AppError> {
    serde_json::from_value(value).map_err(|e| {
        tracing::warn!(error = %e, "{context}");
        AppError::BadRequest(context.to_string())
    })
}
