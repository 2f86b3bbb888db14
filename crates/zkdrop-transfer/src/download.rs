//! Download pipeline: link → key material → fetch → decrypt
//!
//! A [`DownloadTransfer`] decrypts at most once. Repeated or concurrent
//! calls to [`DownloadTransfer::fetch`] share the first successful result;
//! a failed attempt leaves the cache empty so the user can retry.

use std::sync::Arc;

use tokio::sync::OnceCell;
use uuid::Uuid;

use zkdrop_core::{PlaintextFile, ShareResult};
use zkdrop_crypto::{decrypt_file, resolve_key_material, EncodedKeyMaterial, ShareLocation};

use crate::backend::{ByteProgress, FileInfo, ShareBackend};
use crate::file_io::FALLBACK_MIME;
use crate::progress::ProgressTracker;

#[derive(Debug)]
pub struct DownloadTransfer {
    uuid: Uuid,
    origin: Option<String>,
    key_material: EncodedKeyMaterial,
    file_name: Option<String>,
    mime_type: Option<String>,
    progress: ProgressTracker,
    result: OnceCell<PlaintextFile>,
}

impl DownloadTransfer {
    /// Build a transfer from a share link. Explicit IV/key take precedence
    /// over the link fragment when both are non-empty. Fails before any
    /// network traffic if neither yields key material.
    pub fn from_link(
        url: &str,
        explicit_iv: Option<&str>,
        explicit_key: Option<&str>,
        progress: ProgressTracker,
    ) -> ShareResult<Self> {
        let location = ShareLocation::parse(url)?;
        let key_material =
            resolve_key_material(explicit_iv, explicit_key, location.fragment.as_deref())?;
        let mut transfer = Self::new(location.uuid, key_material, progress);
        transfer.origin = Some(location.origin);
        Ok(transfer)
    }

    pub fn new(uuid: Uuid, key_material: EncodedKeyMaterial, progress: ProgressTracker) -> Self {
        Self {
            uuid,
            origin: None,
            key_material,
            file_name: None,
            mime_type: None,
            progress,
            result: OnceCell::new(),
        }
    }

    /// Name to give the decrypted file instead of asking the server.
    pub fn with_file_name(mut self, name: impl Into<String>) -> Self {
        self.file_name = Some(name.into()).filter(|n| !n.is_empty());
        self
    }

    pub fn with_mime_type(mut self, mime: impl Into<String>) -> Self {
        self.mime_type = Some(mime.into()).filter(|m| !m.is_empty());
        self
    }

    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    /// Origin from the share link, if built from one.
    pub fn origin(&self) -> Option<&str> {
        self.origin.as_deref()
    }

    pub fn progress(&self) -> &ProgressTracker {
        &self.progress
    }

    /// The decrypted file, if a previous fetch succeeded.
    pub fn result(&self) -> Option<&PlaintextFile> {
        self.result.get()
    }

    /// Download and decrypt, or return the cached result.
    pub async fn fetch<B: ShareBackend>(&self, backend: &B) -> ShareResult<&PlaintextFile> {
        self.result.get_or_try_init(|| self.run(backend)).await
    }

    async fn run<B: ShareBackend>(&self, backend: &B) -> ShareResult<PlaintextFile> {
        self.progress.restart();

        let result = self.execute(backend).await;
        match &result {
            Ok(file) => {
                self.progress.complete();
                tracing::info!(uuid = %self.uuid, file = %file.name(), bytes = file.len(), "download complete");
            }
            Err(e) => {
                self.progress.fail();
                tracing::warn!(uuid = %self.uuid, error = %e, "download failed");
            }
        }
        result
    }

    async fn execute<B: ShareBackend>(&self, backend: &B) -> ShareResult<PlaintextFile> {
        // Unusable key material fails here, before anything is fetched.
        let key_material = self.key_material.decode()?;
        self.progress.start();

        let (file_name, mime_type) = self.resolve_metadata(backend).await;

        let tracker = self.progress.clone();
        let on_bytes: ByteProgress =
            Arc::new(move |loaded, total| tracker.observe_bytes(loaded, total));
        let ciphertext = backend.download(self.uuid, on_bytes).await?;

        self.progress.finalize();
        tokio::task::spawn_blocking(move || {
            decrypt_file(&ciphertext, &key_material, &mime_type, &file_name)
        })
        .await
        .map_err(|e| anyhow::anyhow!("decryption task failed: {e}"))?
    }

    /// Name and MIME type for the result. Explicit values win, then the
    /// server's file info, then guesses. Info lookup failures are not fatal.
    async fn resolve_metadata<B: ShareBackend>(&self, backend: &B) -> (String, String) {
        let info = if self.file_name.is_some() && self.mime_type.is_some() {
            None
        } else {
            match backend.file_info(self.uuid).await {
                Ok(info) => Some(info),
                Err(e) => {
                    tracing::debug!(uuid = %self.uuid, error = %e, "file info unavailable");
                    None
                }
            }
        };
        resolve_names(
            self.file_name.as_deref(),
            self.mime_type.as_deref(),
            info.as_ref(),
        )
    }
}

fn resolve_names(
    file_name: Option<&str>,
    mime_type: Option<&str>,
    info: Option<&FileInfo>,
) -> (String, String) {
    let known_name = file_name
        .or(info.map(|i| i.file_name.as_str()))
        .filter(|n| !n.is_empty());

    let mime_type = mime_type
        .or(info.and_then(|i| i.file_type.as_deref()))
        .or_else(|| known_name.and_then(|n| mime_guess::from_path(n).first_raw()))
        .unwrap_or(FALLBACK_MIME)
        .to_string();

    let file_name = match known_name {
        Some(name) => name.to_string(),
        None => fallback_file_name(&mime_type),
    };
    (file_name, mime_type)
}

/// `file.{ext}` for a MIME type, or plain `file` if it has no known extension.
pub fn fallback_file_name(mime_type: &str) -> String {
    match mime_guess::get_mime_extensions_str(mime_type).and_then(|exts| exts.first()) {
        Some(ext) => format!("file.{ext}"),
        None => "file".to_string(),
    }
}
