//! Whole-file AES-256-GCM encryption/decryption
//!
//! Ciphertext format (binary):
//! ```text
//! [N bytes: ciphertext][16 bytes: GCM tag]
//! ```
//!
//! The IV is not prepended; it travels in the share link fragment together
//! with the key. No AAD. The entire file is processed in one call.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};

use zkdrop_core::{PlaintextFile, ShareError, ShareResult, SizePolicy};

use crate::keys::KeyMaterial;
use crate::TAG_SIZE;

/// Output of [`encrypt_file`]: the bytes for the server and the key material
/// for the share link. The two must never travel together.
#[derive(Debug)]
pub struct EncryptedPayload {
    pub ciphertext: Vec<u8>,
    pub key_material: KeyMaterial,
}

/// Encrypt a whole file under fresh key material.
///
/// The plaintext length is checked against `policy` before any crypto runs,
/// and the ciphertext length is checked again afterwards.
pub fn encrypt_file(file: &PlaintextFile, policy: &SizePolicy) -> ShareResult<EncryptedPayload> {
    policy.check_plaintext(file.len())?;

    let key_material = KeyMaterial::generate();
    let ciphertext = seal(&key_material, file.data())?;

    policy.check_ciphertext(ciphertext.len() as u64)?;

    tracing::debug!(
        name = %file.name(),
        plaintext = file.len(),
        ciphertext = ciphertext.len(),
        "file encrypted"
    );

    Ok(EncryptedPayload {
        ciphertext,
        key_material,
    })
}

/// Encrypt `plaintext` with the given key material. Only `encrypt_file`
/// calls this, with key material generated for that one file.
fn seal(key_material: &KeyMaterial, plaintext: &[u8]) -> ShareResult<Vec<u8>> {
    let cipher = Aes256Gcm::new(key_material.key().into());
    let nonce = Nonce::from_slice(key_material.iv());

    cipher
        .encrypt(nonce, plaintext)
        .map_err(|e| anyhow::anyhow!("file encryption failed: {e}").into())
}

/// Decrypt a downloaded ciphertext into a named, typed file.
///
/// Either the whole plaintext is recovered and authenticated, or the call
/// fails with [`ShareError::DecryptionFailure`]. No partial output.
pub fn decrypt_file(
    ciphertext: &[u8],
    key_material: &KeyMaterial,
    mime_type: &str,
    file_name: &str,
) -> ShareResult<PlaintextFile> {
    if ciphertext.len() < TAG_SIZE {
        tracing::debug!(len = ciphertext.len(), "ciphertext shorter than GCM tag");
        return Err(ShareError::DecryptionFailure);
    }

    let cipher = Aes256Gcm::new(key_material.key().into());
    let nonce = Nonce::from_slice(key_material.iv());

    let plaintext = cipher
        .decrypt(nonce, ciphertext)
        .map_err(|_| ShareError::DecryptionFailure)?;

    Ok(PlaintextFile::new(file_name, mime_type, plaintext))
}
