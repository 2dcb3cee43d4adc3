//! Mapping between abstract record identifiers and Kubernetes-legal object
//! names, plus the payload encoding used inside secret data fields.
//!
//! Secret names must be valid DNS-1123 subdomains and the `type` field cannot
//! be used in get/list calls, so record identity is hex-encoded into the
//! object name and the human-meaningful identifiers travel on labels instead.
//! Payloads are gzip-compressed and base64-encoded so arbitrary bytes survive
//! storage in a data field with no further escaping concerns.

use std::io::{Read, Write};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use once_cell::sync::Lazy;
use regex::Regex;

use stevedore_plugin_spec::{Error, Result};

/// Well-known record name of the single migration marker.
pub const SCHEMA_NAME: &str = "schema";
/// Item type substituted when the marker is addressed without one.
pub const SCHEMA_TYPE: &str = "schema";
/// Owner label stamped on every record the plugin writes.
pub const OWNER: &str = "stevedore";
/// Data field under which resolvable secret values are stored.
pub const SECRET_DATA_KEY: &str = "value";
/// The one source kind handled by the cluster rather than the host.
pub const SECRET_SOURCE_KIND: &str = "secret";
/// Kubernetes caps a single Secret object at 1 MiB.
pub const MAX_SECRET_SIZE: usize = 1_048_576;

static START_END: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^a-z0-9]|[^a-z0-9]$").expect("start/end pattern"));
static ILLEGAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-z0-9-.]+").expect("illegal character pattern"));

/// Physical object name for a record. Hex keeps the result DNS-legal and
/// injective over `(item type, name)`; the originals are recovered from
/// labels, never from this name.
pub fn resource_name(item_type: &str, name: &str) -> String {
    hex::encode(format!("{item_type}-{name}"))
}

/// Kubernetes `type` field for a record's secret object.
pub fn secret_object_type(item_type: &str) -> String {
    format!("stevedore.sh/{item_type}.v1")
}

/// The schema marker may be addressed without an item type; substitute the
/// well-known one so the marker has a stable physical name.
pub fn qualify_item_type<'a>(item_type: &'a str, name: &str) -> &'a str {
    if item_type.is_empty() && name.eq_ignore_ascii_case(SCHEMA_NAME) {
        SCHEMA_TYPE
    } else {
        item_type
    }
}

/// Convert a human-chosen secret key into a legal object name:
/// lowercase only, `[a-z0-9-.]` in the middle, alphanumeric at both ends.
/// A non-alphanumeric first or last character is replaced with `000`; any
/// remaining run of illegal characters collapses to a single `-`.
pub fn sanitize_key(key: &str) -> String {
    let lowered = key.to_lowercase();
    let pinned = START_END.replace_all(&lowered, "000");
    ILLEGAL.replace_all(&pinned, "-").into_owned()
}

/// Encode a payload for storage: empty stays empty, anything else is
/// gzipped at best compression and base64-encoded.
pub fn encode_payload(data: &[u8]) -> Result<String> {
    if data.is_empty() {
        return Ok(String::new());
    }

    let mut encoder = GzEncoder::new(Vec::new(), Compression::best());
    encoder
        .write_all(data)
        .and_then(|()| encoder.finish())
        .map(|compressed| STANDARD.encode(compressed))
        .map_err(|err| Error::Validation(format!("could not compress payload: {err}")))
}

/// Inverse of [`encode_payload`]; empty input yields empty bytes, not an
/// error.
pub fn decode_payload(encoded: &str) -> Result<Vec<u8>> {
    if encoded.is_empty() {
        return Ok(Vec::new());
    }

    let compressed = STANDARD
        .decode(encoded)
        .map_err(|err| Error::Validation(format!("stored payload is not valid base64: {err}")))?;
    let mut decoder = GzDecoder::new(compressed.as_slice());
    let mut data = Vec::new();
    decoder
        .read_to_end(&mut data)
        .map_err(|err| Error::Validation(format!("stored payload is not valid gzip: {err}")))?;
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_name_is_stable_hex() {
        assert_eq!(resource_name("test", "test"), "746573742d74657374");
        assert_eq!(
            resource_name("installations", "installation1"),
            resource_name("installations", "installation1")
        );
    }

    #[test]
    fn resource_name_satisfies_the_secret_name_grammar() {
        for (item_type, name) in [
            ("installations", "Installation With Spaces"),
            ("claims", "claim/with/slashes"),
            ("", "schema"),
        ] {
            let physical = resource_name(item_type, name);
            assert!(physical.chars().all(|c| matches!(c, '0'..='9' | 'a'..='f')));
        }
    }

    #[test]
    fn distinct_identities_never_collide() {
        // "ab"+"c" vs "a"+"bc" is exactly the kind of pair plain
        // concatenation would merge.
        assert_ne!(resource_name("ab", "c"), resource_name("a", "bc"));
    }

    #[test]
    fn schema_substitution_only_applies_without_item_type() {
        assert_eq!(qualify_item_type("", "schema"), "schema");
        assert_eq!(qualify_item_type("", "SCHEMA"), "schema");
        assert_eq!(qualify_item_type("installations", "schema"), "installations");
        assert_eq!(qualify_item_type("", "installation1"), "");
    }

    #[test]
    fn sanitize_leaves_canonical_keys_alone() {
        assert_eq!(sanitize_key("testkey"), "testkey");
        assert_eq!(sanitize_key("db-password.prod"), "db-password.prod");
    }

    #[test]
    fn sanitize_folds_case_and_replaces_illegal_characters() {
        assert_eq!(sanitize_key("TestKey"), "testkey");
        assert_eq!(sanitize_key("test_key"), "test-key");
        assert_eq!(sanitize_key("my&secret!"), "my-secret000");
        assert_eq!(sanitize_key("-test-"), "000test000");
    }

    #[test]
    fn sanitize_is_idempotent_on_its_own_output() {
        for key in ["testkey", "TestKey", "test_key", "my&secret!", "-test-"] {
            let once = sanitize_key(key);
            assert_eq!(sanitize_key(&once), once, "sanitizing {key} twice drifted");
        }
    }

    #[test]
    fn payload_round_trips() {
        for payload in [
            &b""[..],
            b"v1",
            b"schema data",
            &[0u8, 159, 146, 150],
            &[0u8; 4096],
        ] {
            let encoded = encode_payload(payload).unwrap();
            assert_eq!(decode_payload(&encoded).unwrap(), payload);
        }
    }

    #[test]
    fn empty_payload_maps_to_empty_both_ways() {
        assert_eq!(encode_payload(b"").unwrap(), "");
        assert_eq!(decode_payload("").unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn repetitive_payloads_actually_compress() {
        let payload = vec![b'a'; 16_384];
        let encoded = encode_payload(&payload).unwrap();
        assert!(encoded.len() < payload.len() / 10);
    }

    #[test]
    fn corrupt_payloads_are_rejected() {
        assert!(decode_payload("not//valid//base64!!!").is_err());
        // Valid base64, but not gzip underneath.
        let encoded = STANDARD.encode(b"plain bytes");
        assert!(decode_payload(&encoded).is_err());
    }
}
