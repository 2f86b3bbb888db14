use thiserror::Error;

pub type ShareResult<T> = Result<T, ShareError>;

#[derive(Debug, Error)]
pub enum ShareError {
    /// Plaintext or ciphertext is larger than the size policy allows.
    #[error("{what} size {size} bytes exceeds the {limit} byte limit")]
    SizeLimitExceeded {
        what: &'static str,
        size: u64,
        limit: u64,
    },

    /// No usable response: connection refused, reset, or body cut short.
    #[error("transport error: {0}")]
    Transport(String),

    /// The server answered with a structured failure.
    #[error("{message}")]
    ServerRejection { status: u16, message: String },

    /// Tag mismatch, wrong key, wrong IV or malformed key material.
    /// Deliberately carries no detail.
    #[error("failed decrypting file")]
    DecryptionFailure,

    #[error("malformed share link: {0}")]
    MalformedShareLink(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ShareError {
    pub fn transport(err: impl std::fmt::Display) -> Self {
        ShareError::Transport(err.to_string())
    }

    pub fn malformed_link(reason: impl Into<String>) -> Self {
        ShareError::MalformedShareLink(reason.into())
    }
}
