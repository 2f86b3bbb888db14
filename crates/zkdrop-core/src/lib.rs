//! zkdrop-core: shared types, error taxonomy, size policy and config schema
//!
//! Every other zkdrop crate depends on this one. It carries no crypto and does
//! no I/O; config is parsed by the caller.

pub mod config;
pub mod error;
pub mod limits;
pub mod types;

pub use error::{ShareError, ShareResult};
pub use limits::{SizePolicy, MAX_CIPHERTEXT_SIZE, MAX_PLAINTEXT_SIZE};
pub use types::{Lifetime, PlaintextFile, TransportBundle};
