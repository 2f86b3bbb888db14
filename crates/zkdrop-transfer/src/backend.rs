//! Share server abstraction
//!
//! The server stores opaque ciphertext plus `{file_name, mime_type, lifetime}`
//! and hands out a UUID. Key material never crosses this trait.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use uuid::Uuid;

use zkdrop_core::{ShareResult, TransportBundle};

/// Byte-level transfer callback: `(loaded, total)`. `total` is `None` when
/// the transport cannot tell how many bytes to expect.
pub type ByteProgress = Arc<dyn Fn(u64, Option<u64>) + Send + Sync>;

/// Metadata the server keeps about an upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    pub file_name: String,
    pub file_type: Option<String>,
    /// Unix timestamp (seconds) after which the upload is deleted.
    pub available_till: i64,
}

impl FileInfo {
    /// Time left until expiry, or `None` if already expired.
    pub fn remaining(&self) -> Option<Duration> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or_default();
        self.remaining_at(now)
    }

    pub fn remaining_at(&self, now_secs: i64) -> Option<Duration> {
        let left = self.available_till.checked_sub(now_secs)?;
        (left > 0).then(|| Duration::from_secs(left as u64))
    }
}

pub trait ShareBackend: Send + Sync {
    /// Origin used to build share links, without a trailing slash.
    fn origin(&self) -> &str;

    /// Store a bundle and return the id the server assigned.
    fn upload(
        &self,
        bundle: TransportBundle,
        progress: ByteProgress,
    ) -> impl Future<Output = ShareResult<Uuid>> + Send;

    /// Fetch the ciphertext stored under `uuid`.
    fn download(
        &self,
        uuid: Uuid,
        progress: ByteProgress,
    ) -> impl Future<Output = ShareResult<Vec<u8>>> + Send;

    fn file_info(&self, uuid: Uuid) -> impl Future<Output = ShareResult<FileInfo>> + Send;
}

/// Discards byte updates.
pub fn no_progress() -> ByteProgress {
    Arc::new(|_, _| {})
}
