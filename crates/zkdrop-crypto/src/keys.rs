//! Per-file key material: AES-256 key + 96-bit IV, generated fresh per upload.

use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::Zeroize;

use zkdrop_core::{ShareError, ShareResult};

use crate::encoding::{decode_base64url, encode_base64url};
use crate::{IV_SIZE, KEY_SIZE};

/// A key + IV pair. Zeroized on drop, not `Clone`: one instance drives
/// exactly one encryption or one decryption.
pub struct KeyMaterial {
    key: [u8; KEY_SIZE],
    iv: [u8; IV_SIZE],
}

impl KeyMaterial {
    /// Draw a fresh key and IV from the OS CSPRNG.
    pub fn generate() -> Self {
        let mut key = [0u8; KEY_SIZE];
        let mut iv = [0u8; IV_SIZE];
        OsRng.fill_bytes(&mut key);
        OsRng.fill_bytes(&mut iv);
        Self { key, iv }
    }

    pub fn from_bytes(key: [u8; KEY_SIZE], iv: [u8; IV_SIZE]) -> Self {
        Self { key, iv }
    }

    pub fn key(&self) -> &[u8; KEY_SIZE] {
        &self.key
    }

    pub fn iv(&self) -> &[u8; IV_SIZE] {
        &self.iv
    }

    /// Base64Url form, ready for a share link fragment.
    pub fn encode(&self) -> EncodedKeyMaterial {
        EncodedKeyMaterial {
            iv: encode_base64url(&self.iv),
            key: encode_base64url(&self.key),
        }
    }
}

impl Drop for KeyMaterial {
    fn drop(&mut self) {
        self.key.zeroize();
        self.iv.zeroize();
    }
}

impl std::fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("key", &"[REDACTED]")
            .field("iv", &"[REDACTED]")
            .finish()
    }
}

/// Key material as the two Base64Url tokens carried in a share link.
#[derive(Clone, PartialEq, Eq)]
pub struct EncodedKeyMaterial {
    pub iv: String,
    pub key: String,
}

impl EncodedKeyMaterial {
    pub fn new(iv: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            iv: iv.into(),
            key: key.into(),
        }
    }

    /// `iv~key`
    pub fn fragment(&self) -> String {
        format!("{}~{}", self.iv, self.key)
    }

    /// Decode both tokens. Any defect (bad alphabet, wrong length) is reported
    /// as a plain decryption failure so callers cannot tell which half was bad.
    pub fn decode(&self) -> ShareResult<KeyMaterial> {
        let key = decode_fixed::<KEY_SIZE>(&self.key)?;
        let iv = decode_fixed::<IV_SIZE>(&self.iv)?;
        Ok(KeyMaterial::from_bytes(key, iv))
    }
}

fn decode_fixed<const N: usize>(token: &str) -> ShareResult<[u8; N]> {
    let mut bytes = decode_base64url(token).map_err(|_| ShareError::DecryptionFailure)?;
    if bytes.len() != N {
        bytes.zeroize();
        return Err(ShareError::DecryptionFailure);
    }
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes);
    bytes.zeroize();
    Ok(out)
}

impl std::fmt::Debug for EncodedKeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncodedKeyMaterial")
            .field("iv", &"[REDACTED]")
            .field("key", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generation_is_fresh() {
        let a = KeyMaterial::generate();
        let b = KeyMaterial::generate();
        assert_ne!(a.key(), b.key(), "random keys must differ");
        assert_ne!(a.iv(), b.iv(), "random IVs must differ");
    }

    #[test]
    fn test_encode_decode_roundtrip() {
        let km = KeyMaterial::generate();
        let encoded = km.encode();
        let decoded = encoded.decode().unwrap();
        assert_eq!(km.key(), decoded.key());
        assert_eq!(km.iv(), decoded.iv());
    }

    #[test]
    fn test_encoded_lengths() {
        let encoded = KeyMaterial::from_bytes([7u8; KEY_SIZE], [9u8; IV_SIZE]).encode();
        // 32 bytes → 43 unpadded chars, 12 bytes → 16 chars
        assert_eq!(encoded.key.len(), 43);
        assert_eq!(encoded.iv.len(), 16);
        assert_eq!(encoded.fragment(), format!("{}~{}", encoded.iv, encoded.key));
    }

    #[test]
    fn test_swapped_tokens_fail() {
        let encoded = KeyMaterial::generate().encode();
        let swapped = EncodedKeyMaterial::new(encoded.key.clone(), encoded.iv.clone());
        assert!(matches!(
            swapped.decode(),
            Err(ShareError::DecryptionFailure)
        ));
    }

    #[test]
    fn test_garbage_tokens_fail_generically() {
        let bad = EncodedKeyMaterial::new("AAAA", "BBBB");
        assert!(matches!(bad.decode(), Err(ShareError::DecryptionFailure)));

        let bad = EncodedKeyMaterial::new("!!", "??");
        assert!(matches!(bad.decode(), Err(ShareError::DecryptionFailure)));
    }

    #[test]
    fn test_debug_redacts() {
        let km = KeyMaterial::from_bytes([0xAB; KEY_SIZE], [0xCD; IV_SIZE]);
        let dbg = format!("{km:?} {:?}", km.encode());
        assert!(dbg.contains("REDACTED"));
        assert!(!dbg.contains(&km.encode().key));
    }
}
