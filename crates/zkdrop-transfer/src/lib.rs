//! zkdrop-transfer: upload and download pipelines on top of zkdrop-crypto
//!
//! ```text
//! upload:   PlaintextFile ─encrypt─▶ TransportBundle ─ShareBackend─▶ uuid ─▶ ShareLink
//! download: ShareLink ─▶ (uuid, key material) ─ShareBackend─▶ ciphertext ─decrypt─▶ PlaintextFile
//! ```
//!
//! Every transfer owns its own [`ProgressTracker`]; transfers can run
//! concurrently without sharing keys or progress state.

pub mod backend;
pub mod download;
pub mod file_io;
pub mod http;
pub mod memory;
pub mod progress;
pub mod upload;
pub mod wire;

pub use backend::{no_progress, ByteProgress, FileInfo, ShareBackend};
pub use download::{fallback_file_name, DownloadTransfer};
pub use http::HttpBackend;
pub use memory::MemoryBackend;
pub use progress::{
    Direction, Phase, ProgressEstimator, ProgressFn, ProgressSnapshot, ProgressTracker,
};
pub use upload::{UploadResult, UploadTransfer};
