//! Size policy applied before any bytes leave the device.
//!
//! Plaintext and ciphertext are checked independently: AES-GCM adds a 16-byte
//! tag, so a plaintext right at the limit still yields an oversized ciphertext.

use serde::{Deserialize, Serialize};

use crate::error::{ShareError, ShareResult};

/// 1 GiB
pub const MAX_PLAINTEXT_SIZE: u64 = 1_073_741_824;

/// 1 GiB
pub const MAX_CIPHERTEXT_SIZE: u64 = 1_073_741_824;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SizePolicy {
    pub max_plaintext_bytes: u64,
    pub max_ciphertext_bytes: u64,
}

impl Default for SizePolicy {
    fn default() -> Self {
        Self {
            max_plaintext_bytes: MAX_PLAINTEXT_SIZE,
            max_ciphertext_bytes: MAX_CIPHERTEXT_SIZE,
        }
    }
}

impl SizePolicy {
    pub fn check_plaintext(&self, len: u64) -> ShareResult<()> {
        check("plaintext", len, self.max_plaintext_bytes)
    }

    pub fn check_ciphertext(&self, len: u64) -> ShareResult<()> {
        check("ciphertext", len, self.max_ciphertext_bytes)
    }
}

fn check(what: &'static str, size: u64, limit: u64) -> ShareResult<()> {
    if size > limit {
        tracing::debug!(what, size, limit, "size policy rejected payload");
        return Err(ShareError::SizeLimitExceeded { what, size, limit });
    }
    Ok(())
}
