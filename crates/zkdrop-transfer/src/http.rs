//! HTTP transport to a share server, built on reqwest

use std::time::Duration;

use bytes::Bytes;
use futures::StreamExt;
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client};
use uuid::Uuid;

use zkdrop_core::config::ZkdropConfig;
use zkdrop_core::{ShareError, ShareResult, SizePolicy, TransportBundle};

use crate::backend::{ByteProgress, FileInfo, ShareBackend};
use crate::wire;

/// Upload body chunk size; also the granularity of upload progress.
const UPLOAD_CHUNK: usize = 64 * 1024;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
    origin: String,
    policy: SizePolicy,
}

impl HttpBackend {
    /// Backend for the configured server origin.
    pub fn from_config(config: &ZkdropConfig) -> ShareResult<Self> {
        Self::for_origin(&config.server.origin, config)
    }

    /// Backend for an explicit origin (e.g. the one embedded in a share link),
    /// with TLS and size settings taken from `config`.
    ///
    /// If `enforce_tls` is set and the origin uses HTTP, this returns an error.
    /// Otherwise a warning is logged for non-HTTPS origins.
    pub fn for_origin(origin: &str, config: &ZkdropConfig) -> ShareResult<Self> {
        let origin = origin.trim().trim_end_matches('/');
        if !origin.starts_with("http://") && !origin.starts_with("https://") {
            return Err(ShareError::Config(format!(
                "server origin must start with http:// or https:// (got '{origin}')"
            )));
        }
        if origin.starts_with("http://") {
            if config.server.enforce_tls {
                return Err(ShareError::Config(format!(
                    "server origin uses plaintext HTTP ({origin}), but enforce_tls is enabled. \
                     Use an HTTPS origin or set server.enforce_tls = false for local development."
                )));
            }
            tracing::warn!(
                origin = %origin,
                "server origin uses plaintext HTTP; ciphertext and metadata travel unprotected"
            );
        }

        let client = Client::builder()
            .user_agent(concat!("zkdrop/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(ShareError::transport)?;

        Ok(Self {
            client,
            origin: origin.to_string(),
            policy: config.limits,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.origin)
    }
}

impl ShareBackend for HttpBackend {
    fn origin(&self) -> &str {
        &self.origin
    }

    async fn upload(&self, bundle: TransportBundle, progress: ByteProgress) -> ShareResult<Uuid> {
        let TransportBundle {
            ciphertext,
            file_name,
            mime_type,
            lifetime,
        } = bundle;

        let total = ciphertext.len() as u64;
        let part = Part::stream_with_length(counting_body(Bytes::from(ciphertext), progress), total)
            .file_name(wire::FILE_PART_NAME)
            .mime_str(wire::CIPHERTEXT_MIME)
            .map_err(ShareError::transport)?;

        let form = Form::new()
            .text(wire::FIELD_FILE_NAME, file_name)
            .text(wire::FIELD_FILE_TYPE, mime_type)
            .text(wire::FIELD_LIFETIME, lifetime.as_token())
            .part(wire::FIELD_FILE, part);

        let url = self.url(wire::UPLOAD_PATH);
        tracing::debug!(url = %url, bytes = total, "uploading ciphertext");

        let resp = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(ShareError::transport)?;

        let status = resp.status().as_u16();
        let body = resp.bytes().await.map_err(ShareError::transport)?;
        wire::parse_upload_response(status, &body)
    }

    async fn download(&self, uuid: Uuid, progress: ByteProgress) -> ShareResult<Vec<u8>> {
        let url = self.url(&wire::download_path(uuid));
        tracing::debug!(url = %url, "downloading ciphertext");

        let mut resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(ShareError::transport)?;

        let status = resp.status().as_u16();
        if status != 200 {
            let body = resp.bytes().await.unwrap_or_default();
            return Err(wire::parse_error_body(status, &body));
        }

        let total = resp.content_length().filter(|&n| n > 0);
        if let Some(total) = total {
            self.policy.check_ciphertext(total)?;
        }

        let capacity = total.unwrap_or(0).min(self.policy.max_ciphertext_bytes);
        let mut buf = Vec::with_capacity(usize::try_from(capacity).unwrap_or(0));
        let mut loaded = 0u64;
        progress(0, total);

        while let Some(chunk) = resp.chunk().await.map_err(ShareError::transport)? {
            loaded += chunk.len() as u64;
            self.policy.check_ciphertext(loaded)?;
            buf.extend_from_slice(&chunk);
            progress(loaded, total);
        }

        if let Some(total) = total {
            if loaded < total {
                return Err(ShareError::Transport(format!(
                    "connection closed after {loaded} of {total} bytes"
                )));
            }
        }

        Ok(buf)
    }

    async fn file_info(&self, uuid: Uuid) -> ShareResult<FileInfo> {
        let url = self.url(&wire::info_path(uuid));
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(ShareError::transport)?;
        let status = resp.status().as_u16();
        let body = resp.bytes().await.map_err(ShareError::transport)?;
        wire::parse_file_info(status, &body)
    }
}

/// Stream `data` in fixed chunks, reporting each chunk as it is handed to
/// the connection.
fn counting_body(data: Bytes, progress: ByteProgress) -> Body {
    let total = data.len() as u64;
    let chunks: Vec<Bytes> = (0..data.len())
        .step_by(UPLOAD_CHUNK)
        .map(|start| data.slice(start..(start + UPLOAD_CHUNK).min(data.len())))
        .collect();

    let mut sent = 0u64;
    let stream = futures::stream::iter(chunks).map(move |chunk| {
        sent += chunk.len() as u64;
        progress(sent, Some(total));
        Ok::<_, std::io::Error>(chunk)
    });
    Body::wrap_stream(stream)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(origin: &str, enforce_tls: bool) -> ZkdropConfig {
        let mut cfg = ZkdropConfig::default();
        cfg.server.origin = origin.into();
        cfg.server.enforce_tls = enforce_tls;
        cfg
    }

    #[test]
    fn http_origin_allowed_without_enforce_tls() {
        let backend = HttpBackend::from_config(&config("http://localhost:8080/", false)).unwrap();
        assert_eq!(backend.origin(), "http://localhost:8080");
    }

    #[test]
    fn http_origin_rejected_with_enforce_tls() {
        let err = HttpBackend::from_config(&config("http://insecure:8080", true)).unwrap_err();
        assert!(matches!(err, ShareError::Config(_)));
    }

    #[test]
    fn https_origin_with_enforce_tls() {
        let backend = HttpBackend::from_config(&config("https://share.example.com", true)).unwrap();
        assert_eq!(backend.url("/api/upload"), "https://share.example.com/api/upload");
    }

    #[test]
    fn origin_without_scheme_rejected() {
        assert!(HttpBackend::from_config(&config("share.example.com", false)).is_err());
    }

    #[test]
    fn link_origin_overrides_configured_one() {
        let cfg = config("https://configured.example", false);
        let backend = HttpBackend::for_origin("https://from-link.example", &cfg).unwrap();
        assert_eq!(backend.origin(), "https://from-link.example");
    }
}
