use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A file held entirely in memory, immutable once read.
#[derive(Clone, PartialEq, Eq)]
pub struct PlaintextFile {
    name: String,
    mime_type: String,
    data: Vec<u8>,
}

impl PlaintextFile {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            data,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> u64 {
        self.data.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }
}

impl fmt::Debug for PlaintextFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlaintextFile")
            .field("name", &self.name)
            .field("mime_type", &self.mime_type)
            .field("len", &self.data.len())
            .finish()
    }
}

/// How long the server keeps an upload before expiring it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Lifetime {
    #[default]
    #[serde(rename = "1d")]
    OneDay,
    #[serde(rename = "7d")]
    SevenDays,
    #[serde(rename = "28d")]
    TwentyEightDays,
}

impl Lifetime {
    /// Token sent in the `lifetime` multipart field.
    pub fn as_token(&self) -> &'static str {
        match self {
            Lifetime::OneDay => "1d",
            Lifetime::SevenDays => "7d",
            Lifetime::TwentyEightDays => "28d",
        }
    }

    pub fn as_secs(&self) -> u64 {
        match self {
            Lifetime::OneDay => 86_400,
            Lifetime::SevenDays => 86_400 * 7,
            Lifetime::TwentyEightDays => 86_400 * 28,
        }
    }
}

impl fmt::Display for Lifetime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_token())
    }
}

impl FromStr for Lifetime {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1d" => Ok(Lifetime::OneDay),
            "7d" => Ok(Lifetime::SevenDays),
            "28d" => Ok(Lifetime::TwentyEightDays),
            other => Err(format!("unknown lifetime '{other}' (expected 1d, 7d or 28d)")),
        }
    }
}

/// What crosses the wire on upload. Ciphertext and metadata stay separate:
/// the server-side content type of `ciphertext` says nothing about `mime_type`.
#[derive(Clone)]
pub struct TransportBundle {
    pub ciphertext: Vec<u8>,
    pub file_name: String,
    pub mime_type: String,
    pub lifetime: Lifetime,
}

impl fmt::Debug for TransportBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportBundle")
            .field("ciphertext_len", &self.ciphertext.len())
            .field("file_name", &self.file_name)
            .field("mime_type", &self.mime_type)
            .field("lifetime", &self.lifetime)
            .finish()
    }
}
