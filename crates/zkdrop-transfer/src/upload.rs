//! Upload pipeline: read → encrypt → pack → send → share link
//!
//! Each call to [`UploadTransfer::run`] generates fresh key material; a
//! failed attempt's key is dropped with it and never reused.

use std::sync::Arc;

use uuid::Uuid;

use zkdrop_core::{Lifetime, PlaintextFile, ShareResult, SizePolicy, TransportBundle};
use zkdrop_crypto::{encrypt_file, EncryptedPayload, ShareLink};

use crate::backend::{ByteProgress, ShareBackend};
use crate::progress::ProgressTracker;

/// Result of uploading a single file
#[derive(Debug)]
pub struct UploadResult {
    pub uuid: Uuid,
    /// Full link including the key fragment. Hand it to the user, never log it.
    pub link: ShareLink,
    pub file_name: String,
    pub plaintext_bytes: u64,
    pub ciphertext_bytes: u64,
}

/// One file on its way to the server. Owns its progress state; nothing here
/// is shared with other transfers.
#[derive(Debug)]
pub struct UploadTransfer {
    file: PlaintextFile,
    lifetime: Lifetime,
    policy: SizePolicy,
    progress: ProgressTracker,
}

impl UploadTransfer {
    pub fn new(
        file: PlaintextFile,
        lifetime: Lifetime,
        policy: SizePolicy,
        progress: ProgressTracker,
    ) -> Self {
        Self {
            file,
            lifetime,
            policy,
            progress,
        }
    }

    pub fn progress(&self) -> &ProgressTracker {
        &self.progress
    }

    /// Encrypt and upload. Progress ends in `Complete` or `Failed` either way.
    pub async fn run<B: ShareBackend>(self, backend: &B) -> ShareResult<UploadResult> {
        let tracker = self.progress.clone();
        let name = self.file.name().to_string();

        let result = self.execute(backend).await;
        match &result {
            Ok(done) => {
                tracker.complete();
                tracing::info!(
                    file = %done.file_name,
                    link = %done.link.redacted(),
                    bytes = done.ciphertext_bytes,
                    "upload complete"
                );
            }
            Err(e) => {
                tracker.fail();
                tracing::warn!(file = %name, error = %e, "upload failed");
            }
        }
        result
    }

    async fn execute<B: ShareBackend>(self, backend: &B) -> ShareResult<UploadResult> {
        // Nothing is encrypted or sent for an oversized file.
        self.policy.check_plaintext(self.file.len())?;
        self.progress.start();

        let file_name = self.file.name().to_string();
        let mime_type = self.file.mime_type().to_string();
        let plaintext_bytes = self.file.len();

        let file = self.file;
        let policy = self.policy;
        let EncryptedPayload {
            ciphertext,
            key_material,
        } = tokio::task::spawn_blocking(move || encrypt_file(&file, &policy))
            .await
            .map_err(|e| anyhow::anyhow!("encryption task failed: {e}"))??;

        let ciphertext_bytes = ciphertext.len() as u64;
        let bundle = TransportBundle {
            ciphertext,
            file_name: file_name.clone(),
            mime_type,
            lifetime: self.lifetime,
        };

        let tracker = self.progress.clone();
        let on_bytes: ByteProgress =
            Arc::new(move |loaded, total| tracker.observe_bytes(loaded, total));
        let uuid = backend.upload(bundle, on_bytes).await?;

        Ok(UploadResult {
            uuid,
            link: ShareLink::new(backend.origin(), uuid, &key_material),
            file_name,
            plaintext_bytes,
            ciphertext_bytes,
        })
    }
}
