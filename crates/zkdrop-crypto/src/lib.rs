//! zkdrop-crypto: client-side encryption for zero-knowledge file sharing
//!
//! Pipeline (upload): plaintext → AES-256-GCM (fresh key + IV) → ciphertext to server,
//! key + IV → Base64Url → share link fragment.
//!
//! Share link layout:
//! ```text
//! {origin}/file/{uuid}#{iv_b64url}~{key_b64url}
//!                     └──── never sent to the server ────┘
//! ```
//!
//! The server only ever sees `{uuid, ciphertext, file_name, mime_type, lifetime}`.

pub mod cipher;
pub mod encoding;
pub mod keys;
pub mod link;

pub use cipher::{decrypt_file, encrypt_file, EncryptedPayload};
pub use encoding::{decode_base64url, encode_base64url};
pub use keys::{EncodedKeyMaterial, KeyMaterial};
pub use link::{resolve_key_material, split_fragment, ShareLink, ShareLocation};

/// AES-256 key size in bytes
pub const KEY_SIZE: usize = 32;

/// AES-GCM nonce size in bytes (96-bit)
pub const IV_SIZE: usize = 12;

/// GCM authentication tag size
pub const TAG_SIZE: usize = 16;
