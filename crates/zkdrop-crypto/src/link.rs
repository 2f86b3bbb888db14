//! Share links and key distribution via URL fragment
//!
//! ```text
//! https://share.example.com/file/6f1c...e2#<iv_b64url>~<key_b64url>
//! └─────── origin ────────┘     └ uuid ┘ └──────── fragment ────────┘
//! ```
//!
//! Everything after `#` stays on the client: browsers and HTTP clients never
//! put the fragment on the wire, so the server never sees the key.

use std::fmt;

use uuid::Uuid;

use zkdrop_core::{ShareError, ShareResult};

use crate::keys::{EncodedKeyMaterial, KeyMaterial};

const FILE_PATH: &str = "/file/";

/// A share link: origin + upload id + key material in the fragment.
#[derive(Clone, PartialEq, Eq)]
pub struct ShareLink {
    pub origin: String,
    pub uuid: Uuid,
    pub key_material: EncodedKeyMaterial,
}

impl ShareLink {
    pub fn new(origin: &str, uuid: Uuid, key_material: &KeyMaterial) -> Self {
        Self {
            origin: origin.trim_end_matches('/').to_string(),
            uuid,
            key_material: key_material.encode(),
        }
    }

    /// Parse a full share link. The fragment is mandatory here.
    pub fn parse(url: &str) -> ShareResult<Self> {
        let location = ShareLocation::parse(url)?;
        let fragment = location
            .fragment
            .as_deref()
            .ok_or_else(|| ShareError::malformed_link("missing '#' fragment with key material"))?;
        let key_material = split_fragment(fragment)?;
        Ok(Self {
            origin: location.origin,
            uuid: location.uuid,
            key_material,
        })
    }

    /// The link without its fragment; safe to log or send to the server.
    pub fn redacted(&self) -> String {
        format!("{}{FILE_PATH}{}", self.origin, self.uuid)
    }
}

impl fmt::Display for ShareLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{FILE_PATH}{}#{}",
            self.origin,
            self.uuid,
            self.key_material.fragment()
        )
    }
}

impl fmt::Debug for ShareLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShareLink")
            .field("origin", &self.origin)
            .field("uuid", &self.uuid)
            .field("key_material", &self.key_material)
            .finish()
    }
}

/// Where a download points, with the fragment kept as raw text. Used when
/// explicit key fields may stand in for the fragment.
#[derive(Clone, PartialEq, Eq)]
pub struct ShareLocation {
    pub origin: String,
    pub uuid: Uuid,
    pub fragment: Option<String>,
}

impl ShareLocation {
    pub fn parse(url: &str) -> ShareResult<Self> {
        let url = url.trim();
        let (base, fragment) = match url.split_once('#') {
            Some((base, frag)) => (base, Some(frag.to_string())),
            None => (url, None),
        };

        let (origin, rest) = base
            .rsplit_once(FILE_PATH)
            .ok_or_else(|| ShareError::malformed_link("expected {origin}/file/{uuid}"))?;
        let id = rest
            .split(['?', '/'])
            .next()
            .unwrap_or_default();
        let uuid = Uuid::try_parse(id)
            .map_err(|_| ShareError::malformed_link(format!("invalid file id '{id}'")))?;

        Ok(Self {
            origin: origin.to_string(),
            uuid,
            fragment,
        })
    }
}

impl fmt::Debug for ShareLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShareLocation")
            .field("origin", &self.origin)
            .field("uuid", &self.uuid)
            .field("has_fragment", &self.fragment.is_some())
            .finish()
    }
}

/// Split an `iv~key` fragment (leading `#` optional) on the first `~`.
pub fn split_fragment(fragment: &str) -> ShareResult<EncodedKeyMaterial> {
    let fragment = fragment.strip_prefix('#').unwrap_or(fragment);
    let (iv, key) = fragment
        .split_once('~')
        .ok_or_else(|| ShareError::malformed_link("fragment has no '~' separator"))?;
    if iv.is_empty() {
        return Err(ShareError::malformed_link("fragment is missing the IV"));
    }
    if key.is_empty() {
        return Err(ShareError::malformed_link("fragment is missing the key"));
    }
    Ok(EncodedKeyMaterial::new(iv, key))
}

/// Pick the key material for a download: explicit IV/key fields win when both
/// are non-empty, otherwise the link fragment is parsed.
pub fn resolve_key_material(
    explicit_iv: Option<&str>,
    explicit_key: Option<&str>,
    fragment: Option<&str>,
) -> ShareResult<EncodedKeyMaterial> {
    match (non_empty(explicit_iv), non_empty(explicit_key)) {
        (Some(iv), Some(key)) => Ok(EncodedKeyMaterial::new(iv, key)),
        _ => match fragment {
            Some(fragment) => split_fragment(fragment),
            None => Err(ShareError::malformed_link(
                "no key material: link has no fragment and no explicit key/IV were given",
            )),
        },
    }
}

fn non_empty(field: Option<&str>) -> Option<&str> {
    field.map(str::trim).filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{IV_SIZE, KEY_SIZE};

    const ID: &str = "0b7f8e0c-3f5e-4c8e-9a51-2d1b6c1f9a77";

    fn malformed<T: fmt::Debug>(r: ShareResult<T>) -> bool {
        matches!(r, Err(ShareError::MalformedShareLink(_)))
    }

    #[test]
    fn fragment_split() {
        let km = split_fragment("#AAAA~BBBB").unwrap();
        assert_eq!(km.iv, "AAAA");
        assert_eq!(km.key, "BBBB");
    }

    #[test]
    fn fragment_split_on_first_separator() {
        let km = split_fragment("AAAA~BB~BB").unwrap();
        assert_eq!(km.iv, "AAAA");
        assert_eq!(km.key, "BB~BB");
    }

    #[test]
    fn fragment_without_separator_fails_closed() {
        assert!(malformed(split_fragment("#AAAA")));
        assert!(malformed(split_fragment("")));
    }

    #[test]
    fn fragment_with_empty_side_fails_closed() {
        assert!(malformed(split_fragment("#~BBBB")));
        assert!(malformed(split_fragment("#AAAA~")));
        assert!(malformed(split_fragment("~")));
    }

    #[test]
    fn link_display_and_parse() {
        let km = KeyMaterial::from_bytes([3u8; KEY_SIZE], [5u8; IV_SIZE]);
        let uuid = Uuid::parse_str(ID).unwrap();
        let link = ShareLink::new("https://share.example.com/", uuid, &km);

        let text = link.to_string();
        assert!(text.starts_with(&format!("https://share.example.com/file/{ID}#")));

        let (before, after) = text.split_once('#').unwrap();
        assert!(!before.contains(&km.encode().key), "key must only follow '#'");
        assert_eq!(after, format!("{}~{}", km.encode().iv, km.encode().key));

        let parsed = ShareLink::parse(&text).unwrap();
        assert_eq!(parsed, link);
        let decoded = parsed.key_material.decode().unwrap();
        assert_eq!(decoded.key(), km.key());
        assert_eq!(decoded.iv(), km.iv());
    }

    #[test]
    fn redacted_link_has_no_fragment() {
        let km = KeyMaterial::generate();
        let link = ShareLink::new("http://localhost:8080", Uuid::new_v4(), &km);
        let redacted = link.redacted();
        assert!(!redacted.contains('#'));
        assert!(!redacted.contains(&km.encode().key));
    }

    #[test]
    fn link_without_fragment_is_malformed() {
        let url = format!("https://share.example.com/file/{ID}");
        assert!(malformed(ShareLink::parse(&url)));

        let loc = ShareLocation::parse(&url).unwrap();
        assert_eq!(loc.origin, "https://share.example.com");
        assert_eq!(loc.fragment, None);
    }

    #[test]
    fn link_with_bad_path_or_id() {
        assert!(malformed(ShareLocation::parse("https://x.example/files/abc#a~b")));
        assert!(malformed(ShareLocation::parse("https://x.example/file/not-a-uuid#a~b")));
    }

    #[test]
    fn location_ignores_query_and_trailing_slash() {
        let loc = ShareLocation::parse(&format!("http://h/file/{ID}/?x=1#a~b")).unwrap();
        assert_eq!(loc.uuid.to_string(), ID);
        assert_eq!(loc.fragment.as_deref(), Some("a~b"));
    }

    #[test]
    fn explicit_fields_take_precedence() {
        let km = resolve_key_material(Some("EXPL_IV"), Some("EXPL_KEY"), Some("#AAAA~BBBB")).unwrap();
        assert_eq!(km.iv, "EXPL_IV");
        assert_eq!(km.key, "EXPL_KEY");
    }

    #[test]
    fn empty_explicit_fields_fall_back_to_fragment() {
        let km = resolve_key_material(Some(""), Some("  "), Some("AAAA~BBBB")).unwrap();
        assert_eq!(km.iv, "AAAA");
        assert_eq!(km.key, "BBBB");

        let km = resolve_key_material(Some("ONLY_IV"), None, Some("AAAA~BBBB")).unwrap();
        assert_eq!(km.iv, "AAAA");
    }

    #[test]
    fn nothing_to_resolve_is_malformed() {
        assert!(malformed(resolve_key_material(None, None, None)));
        assert!(malformed(resolve_key_material(None, None, Some("AAAA"))));
    }
}
