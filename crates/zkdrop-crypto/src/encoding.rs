//! Base64Url codec used for key material in share links.
//!
//! Output uses the URL-safe alphabet (`-` and `_`) with no `=` padding, so a
//! token can sit in a URL fragment untouched. Decoding accepts both padded and
//! unpadded input.

use base64::{
    alphabet,
    engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
    Engine,
};

const BASE64URL: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

pub fn encode_base64url(bytes: &[u8]) -> String {
    BASE64URL.encode(bytes)
}

pub fn decode_base64url(token: &str) -> anyhow::Result<Vec<u8>> {
    BASE64URL
        .decode(token)
        .map_err(|e| anyhow::anyhow!("invalid base64url token: {e}"))
}
