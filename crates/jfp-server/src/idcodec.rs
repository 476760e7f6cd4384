//! Proxy ID codec.
//!
//! Public-facing identifiers are plain strings of the form `prefix_backendID`,
//! distinct from the UUID-backed internal ids in `jfp_core::ids`. This codec
//! never fails on malformed input: callers treat un-decodable strings as
//! opaque values to pass through unchanged.

pub const MERGED_PREFIX: &str = "merged_";

/// Encode a backend-local ID under `prefix` into a client-facing proxy ID.
/// Returns an empty string if `backend_id` is empty.
pub fn encode(prefix: &str, backend_id: &str) -> String {
    if backend_id.is_empty() {
        return String::new();
    }
    format!("{prefix}_{backend_id}")
}

/// Decode a proxy ID into `(prefix, backend_id)`. Splits on the FIRST `_`
/// only, since backend ids may themselves contain underscores.
/// Returns `None` if there is no `_` in the string.
pub fn decode(proxy_id: &str) -> Option<(&str, &str)> {
    proxy_id.split_once('_').filter(|(p, b)| !p.is_empty() && !b.is_empty())
}

/// Decode a proxy ID, falling back to treating the whole string as an
/// opaque backend id with an empty prefix when it doesn't contain `_`.
pub fn decode_lenient(proxy_id: &str) -> (&str, &str) {
    decode(proxy_id).unwrap_or(("", proxy_id))
}

/// Encode a virtual library identifier for a collection type, e.g. `movies` -> `merged_movies`.
pub fn encode_merged(collection_type: &str) -> String {
    format!("{MERGED_PREFIX}{collection_type}")
}

/// Decode a virtual library identifier. Returns `None` if `s` is not a
/// well-formed `merged_<type>` identifier (empty suffix counts as malformed).
pub fn decode_merged(s: &str) -> Option<&str> {
    s.strip_prefix(MERGED_PREFIX).filter(|rest| !rest.is_empty())
}

pub fn is_merged(s: &str) -> bool {
    decode_merged(s).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode_roundtrip() {
        let encoded = encode("s1", "abc-123");
        assert_eq!(encoded, "s1_abc-123");
        let (prefix, backend_id) = decode(&encoded).unwrap();
        assert_eq!(prefix, "s1");
        assert_eq!(backend_id, "abc-123");
    }

    #[test]
    fn empty_backend_id_encodes_to_empty_string() {
        assert_eq!(encode("s1", ""), "");
    }

    #[test]
    fn decode_splits_on_first_underscore_only() {
        let (prefix, backend_id) = decode("s1_abc_def_123").unwrap();
        assert_eq!(prefix, "s1");
        assert_eq!(backend_id, "abc_def_123");
    }

    #[test]
    fn decode_without_underscore_is_none() {
        assert!(decode("noundescore").is_none());
    }

    #[test]
    fn decode_lenient_falls_back_to_opaque() {
        let (prefix, backend_id) = decode_lenient("opaque-value");
        assert_eq!(prefix, "");
        assert_eq!(backend_id, "opaque-value");
    }

    #[test]
    fn merged_encode_decode_roundtrip() {
        let encoded = encode_merged("movies");
        assert_eq!(encoded, "merged_movies");
        assert_eq!(decode_merged(&encoded), Some("movies"));
    }

    #[test]
    fn merged_without_suffix_is_none() {
        assert!(decode_merged("merged_").is_none());
        assert!(decode_merged("merged").is_none());
    }

    #[test]
    fn is_merged_detects_virtual_ids() {
        assert!(is_merged("merged_tvshows"));
        assert!(!is_merged("s1_abc"));
    }
}
