//! In-process share server for tests
//!
//! Behaves like the HTTP server from the client's point of view: assigns
//! random UUIDs, stores opaque ciphertext with metadata, reports byte
//! progress, and can be told to fail.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

use uuid::Uuid;

use zkdrop_core::{Lifetime, ShareError, ShareResult, SizePolicy, TransportBundle};

use crate::backend::{ByteProgress, FileInfo, ShareBackend};

/// Number of progress callbacks per simulated transfer.
const PROGRESS_STEPS: u64 = 4;

/// What the server holds for one upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    pub ciphertext: Vec<u8>,
    pub file_name: String,
    pub mime_type: String,
    pub lifetime: Lifetime,
    pub available_till: i64,
}

#[derive(Debug, Default)]
struct State {
    files: HashMap<Uuid, StoredFile>,
    uploads: usize,
    downloads: usize,
    infos: usize,
    offline: bool,
    rejection: Option<(u16, String)>,
}

#[derive(Debug)]
pub struct MemoryBackend {
    origin: String,
    report_length: bool,
    state: Mutex<State>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new("https://share.test")
    }
}

impl MemoryBackend {
    pub fn new(origin: &str) -> Self {
        Self {
            origin: origin.trim_end_matches('/').to_string(),
            report_length: true,
            state: Mutex::new(State::default()),
        }
    }

    /// Downloads report `None` as total, like a chunked response.
    pub fn without_content_length(mut self) -> Self {
        self.report_length = false;
        self
    }

    /// Every request fails with a transport error while set.
    pub fn set_offline(&self, offline: bool) {
        self.state().offline = offline;
    }

    /// Every request is answered with `{"success":false,"message":…}`.
    pub fn reject_with(&self, status: u16, message: &str) {
        self.state().rejection = Some((status, message.to_string()));
    }

    pub fn clear_rejection(&self) {
        self.state().rejection = None;
    }

    pub fn upload_count(&self) -> usize {
        self.state().uploads
    }

    pub fn download_count(&self) -> usize {
        self.state().downloads
    }

    pub fn info_count(&self) -> usize {
        self.state().infos
    }

    pub fn stored(&self, uuid: Uuid) -> Option<StoredFile> {
        self.state().files.get(&uuid).cloned()
    }

    pub fn stored_ids(&self) -> Vec<Uuid> {
        self.state().files.keys().copied().collect()
    }

    /// Modify stored ciphertext in place. Returns false for unknown ids.
    pub fn tamper(&self, uuid: Uuid, f: impl FnOnce(&mut Vec<u8>)) -> bool {
        match self.state().files.get_mut(&uuid) {
            Some(file) => {
                f(&mut file.ciphertext);
                true
            }
            None => false,
        }
    }

    pub fn expire(&self, uuid: Uuid) -> bool {
        self.state().files.remove(&uuid).is_some()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Shared request preamble: count, then apply injected failures.
    fn admit(&self, count: impl FnOnce(&mut State)) -> ShareResult<()> {
        let mut state = self.state();
        count(&mut state);
        if state.offline {
            return Err(ShareError::Transport("connection refused".into()));
        }
        if let Some((status, message)) = &state.rejection {
            return Err(ShareError::ServerRejection {
                status: *status,
                message: message.clone(),
            });
        }
        Ok(())
    }

    fn not_found() -> ShareError {
        ShareError::ServerRejection {
            status: 500,
            message: "Internal error, please try again later".into(),
        }
    }
}

impl ShareBackend for MemoryBackend {
    fn origin(&self) -> &str {
        &self.origin
    }

    async fn upload(&self, bundle: TransportBundle, progress: ByteProgress) -> ShareResult<Uuid> {
        self.admit(|s| s.uploads += 1)?;

        let total = bundle.ciphertext.len() as u64;
        if SizePolicy::default().check_ciphertext(total).is_err() {
            return Err(ShareError::ServerRejection {
                status: 400,
                message: "File size exceeds 1GB".into(),
            });
        }
        report(&progress, total, Some(total)).await;

        let uuid = Uuid::new_v4();
        let available_till = now_secs() + bundle.lifetime.as_secs() as i64;
        self.state().files.insert(
            uuid,
            StoredFile {
                ciphertext: bundle.ciphertext,
                file_name: bundle.file_name,
                mime_type: bundle.mime_type,
                lifetime: bundle.lifetime,
                available_till,
            },
        );
        Ok(uuid)
    }

    async fn download(&self, uuid: Uuid, progress: ByteProgress) -> ShareResult<Vec<u8>> {
        self.admit(|s| s.downloads += 1)?;
        let ciphertext = self
            .stored(uuid)
            .map(|f| f.ciphertext)
            .ok_or_else(Self::not_found)?;

        let total = ciphertext.len() as u64;
        report(&progress, total, self.report_length.then_some(total)).await;
        Ok(ciphertext)
    }

    async fn file_info(&self, uuid: Uuid) -> ShareResult<FileInfo> {
        self.admit(|s| s.infos += 1)?;
        let file = self.stored(uuid).ok_or_else(Self::not_found)?;
        Ok(FileInfo {
            file_name: file.file_name,
            file_type: Some(file.mime_type),
            available_till: file.available_till,
        })
    }
}

async fn report(progress: &ByteProgress, len: u64, total: Option<u64>) {
    for step in 1..=PROGRESS_STEPS {
        progress(len * step / PROGRESS_STEPS, total);
        tokio::task::yield_now().await;
    }
}

fn now_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::no_progress;
    use std::sync::Arc;

    fn bundle(bytes: &[u8]) -> TransportBundle {
        TransportBundle {
            ciphertext: bytes.to_vec(),
            file_name: "a.bin".into(),
            mime_type: "application/octet-stream".into(),
            lifetime: Lifetime::SevenDays,
        }
    }

    #[tokio::test]
    async fn store_and_fetch() {
        let backend = MemoryBackend::default();
        let uuid = backend.upload(bundle(b"opaque"), no_progress()).await.unwrap();
        assert_eq!(backend.download(uuid, no_progress()).await.unwrap(), b"opaque");

        let info = backend.file_info(uuid).await.unwrap();
        assert_eq!(info.file_name, "a.bin");
        assert!(info.remaining().is_some());
        assert_eq!(backend.upload_count(), 1);
        assert_eq!(backend.download_count(), 1);
    }

    #[tokio::test]
    async fn unknown_id_is_rejected() {
        let backend = MemoryBackend::default();
        let err = backend.download(Uuid::new_v4(), no_progress()).await.unwrap_err();
        assert!(matches!(err, ShareError::ServerRejection { status: 500, .. }));
    }

    #[tokio::test]
    async fn injected_failures() {
        let backend = MemoryBackend::default();
        backend.set_offline(true);
        assert!(matches!(
            backend.upload(bundle(b"x"), no_progress()).await,
            Err(ShareError::Transport(_))
        ));
        backend.set_offline(false);

        backend.reject_with(503, "Couldn't receive storage");
        let err = backend.upload(bundle(b"x"), no_progress()).await.unwrap_err();
        assert_eq!(err.to_string(), "Couldn't receive storage");
        assert_eq!(backend.upload_count(), 2);
        assert!(backend.stored_ids().is_empty());
    }

    #[tokio::test]
    async fn progress_reports_length_when_asked() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let progress: ByteProgress = Arc::new(move |loaded, total| {
            sink.lock().unwrap().push((loaded, total));
        });

        let backend = MemoryBackend::default().without_content_length();
        let uuid = backend.upload(bundle(&[0u8; 100]), no_progress()).await.unwrap();
        backend.download(uuid, progress).await.unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), PROGRESS_STEPS as usize);
        assert!(seen.iter().all(|(_, total)| total.is_none()));
        assert_eq!(seen.last().unwrap().0, 100);
    }
}
