//! Wire format of the share server API
//!
//! ```text
//! POST /api/upload                  multipart: file_name, file_type, lifetime, file
//!   → {"success":true,"uuid":"…"} | {"success":false,"message":"…"}
//! GET  /api/file/{uuid}             → {"success":true,"file_name":"…","available_till":…}
//! GET  /api/file/{uuid}/download    → 200 + raw ciphertext | JSON failure
//! ```

use serde::Deserialize;
use uuid::Uuid;

use zkdrop_core::{ShareError, ShareResult};

use crate::backend::FileInfo;

pub const UPLOAD_PATH: &str = "/api/upload";

// ── Multipart field names ────────────────────────────────────────────────

pub const FIELD_FILE_NAME: &str = "file_name";
pub const FIELD_FILE_TYPE: &str = "file_type";
pub const FIELD_LIFETIME: &str = "lifetime";
pub const FIELD_FILE: &str = "file";

/// Filename attached to the ciphertext part; the real name travels in `file_name`.
pub const FILE_PART_NAME: &str = "file";
pub const CIPHERTEXT_MIME: &str = "application/octet-stream";

pub fn info_path(uuid: Uuid) -> String {
    format!("/api/file/{uuid}")
}

pub fn download_path(uuid: Uuid) -> String {
    format!("/api/file/{uuid}/download")
}

// ── Responses ────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct Envelope {
    success: bool,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UploadOk {
    uuid: String,
}

#[derive(Debug, Deserialize)]
struct FileInfoOk {
    file_name: String,
    #[serde(default)]
    file_type: Option<String>,
    available_till: i64,
}

/// Interpret an upload response. The body decides, not the status: the
/// server reports failures as `{"success":false,"message":…}` under various
/// status codes.
pub fn parse_upload_response(status: u16, body: &[u8]) -> ShareResult<Uuid> {
    let envelope = parse_envelope(status, body)?;
    if !envelope.success {
        return Err(rejection(status, envelope.message));
    }
    let ok: UploadOk = serde_json::from_slice(body).map_err(|_| unexpected(status))?;
    Uuid::try_parse(&ok.uuid).map_err(|_| ShareError::ServerRejection {
        status,
        message: format!("server returned an invalid file id '{}'", ok.uuid),
    })
}

pub fn parse_file_info(status: u16, body: &[u8]) -> ShareResult<FileInfo> {
    let envelope = parse_envelope(status, body)?;
    if !envelope.success {
        return Err(rejection(status, envelope.message));
    }
    let ok: FileInfoOk = serde_json::from_slice(body).map_err(|_| unexpected(status))?;
    Ok(FileInfo {
        file_name: ok.file_name,
        file_type: ok.file_type.filter(|t| !t.is_empty()),
        available_till: ok.available_till,
    })
}

/// Turn a non-success body into a rejection, keeping the server's message
/// when it sent one.
pub fn parse_error_body(status: u16, body: &[u8]) -> ShareError {
    match serde_json::from_slice::<Envelope>(body) {
        Ok(envelope) => rejection(status, envelope.message),
        Err(_) => unexpected(status),
    }
}

fn parse_envelope(status: u16, body: &[u8]) -> ShareResult<Envelope> {
    serde_json::from_slice(body).map_err(|e| {
        tracing::debug!(status, error = %e, "response body is not an API envelope");
        unexpected(status)
    })
}

fn rejection(status: u16, message: Option<String>) -> ShareError {
    match message {
        Some(message) if !message.is_empty() => ShareError::ServerRejection { status, message },
        _ => unexpected(status),
    }
}

fn unexpected(status: u16) -> ShareError {
    ShareError::ServerRejection {
        status,
        message: format!("unexpected response from server (HTTP {status})"),
    }
}
