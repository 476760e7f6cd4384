//! Query-parameter canonicalisation for requests forwarded to a backend.

use crate::idcodec;

/// Canonical casing for query parameter names Jellyfin clients send in
/// varying case. Unrecognised names pass through unchanged.
const CANONICAL_CASING: &[(&str, &str)] = &[
    ("userid", "UserId"),
    ("parentid", "ParentId"),
    ("seasonid", "SeasonId"),
    ("seriesid", "SeriesId"),
    ("albumid", "AlbumId"),
    ("mediasourceid", "MediaSourceId"),
    ("startitemid", "StartItemId"),
    ("adjacentto", "AdjacentTo"),
    ("ids", "Ids"),
    ("includeitemtypes", "IncludeItemTypes"),
    ("recursive", "Recursive"),
    ("sortby", "SortBy"),
    ("sortorder", "SortOrder"),
    ("startindex", "StartIndex"),
    ("limit", "Limit"),
    ("searchterm", "SearchTerm"),
    ("fields", "Fields"),
    ("isfavorite", "IsFavorite"),
    ("isresumable", "IsResumable"),
];

/// Parameter names (canonical casing) whose value is a single proxy ID.
const SINGLE_ID_PARAMS: &[&str] = &[
    "ParentId",
    "SeasonId",
    "SeriesId",
    "AlbumId",
    "MediaSourceId",
    "StartItemId",
    "AdjacentTo",
];

/// Parameter names that must never reach the backend.
const STRIPPED_PARAMS: &[&str] = &["apikey", "api_key"];

pub fn canonical_name(name: &str) -> String {
    let lower = name.to_ascii_lowercase();
    CANONICAL_CASING
        .iter()
        .find(|(k, _)| *k == lower)
        .map(|(_, v)| v.to_string())
        .unwrap_or_else(|| name.to_string())
}

/// Rewrite one query parameter for forwarding to `backend_user_id`'s backend.
/// Returns `None` if the parameter should be dropped entirely.
pub fn rewrite_param(name: &str, value: &str, backend_user_id: Option<&str>) -> Option<(String, String)> {
    let lower = name.to_ascii_lowercase();
    if STRIPPED_PARAMS.contains(&lower.as_str()) {
        return None;
    }

    let canon = canonical_name(name);

    if canon == "UserId" {
        return backend_user_id.map(|id| (canon, id.to_string()));
    }

    if canon == "Ids" {
        let rewritten = value
            .split(',')
            .map(|part| idcodec::decode_lenient(part).1)
            .collect::<Vec<_>>()
            .join(",");
        return Some((canon, rewritten));
    }

    if SINGLE_ID_PARAMS.contains(&canon.as_str()) {
        let (_, backend_id) = idcodec::decode_lenient(value);
        return Some((canon, backend_id.to_string()));
    }

    Some((canon, value.to_string()))
}

/// Canonicalise and rewrite an entire query string's pairs for forwarding to
/// one backend. Parameters that decode to `None` are dropped.
pub fn canonicalize_all(
    pairs: &[(String, String)],
    backend_user_id: Option<&str>,
) -> Vec<(String, String)> {
    pairs
        .iter()
        .filter_map(|(k, v)| rewrite_param(k, v, backend_user_id))
        .collect()
}

/// Strip pagination parameters before fanning out a request to every backend
/// (the proxy re-paginates the merged result itself).
pub fn strip_pagination(pairs: Vec<(String, String)>) -> Vec<(String, String)> {
    pairs
        .into_iter()
        .filter(|(k, _)| {
            let canon = canonical_name(k);
            canon != "StartIndex" && canon != "Limit"
        })
        .collect()
}

/// Read `StartIndex`/`Limit` out of a query so the caller can re-apply them
/// to a merged fan-out result after `strip_pagination` removes them from the
/// per-backend forwarded query.
pub fn extract_pagination(pairs: &[(String, String)]) -> (usize, Option<usize>) {
    let mut start_index = 0usize;
    let mut limit = None;
    for (k, v) in pairs {
        match canonical_name(k).as_str() {
            "StartIndex" => start_index = v.parse().unwrap_or(0),
            "Limit" => limit = v.parse().ok(),
            _ => {}
        }
    }
    (start_index, limit)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonicalizes_case_insensitively() {
        assert_eq!(canonical_name("ParentID"), "ParentId");
        assert_eq!(canonical_name("parentid"), "ParentId");
        assert_eq!(canonical_name("PARENTID"), "ParentId");
    }

    #[test]
    fn unrecognised_name_passes_through() {
        assert_eq!(canonical_name("SomethingElse"), "SomethingElse");
    }

    #[test]
    fn single_id_param_strips_prefix() {
        let (name, value) = rewrite_param("parentid", "s1_abc", None).unwrap();
        assert_eq!(name, "ParentId");
        assert_eq!(value, "abc");
    }

    #[test]
    fn ids_param_splits_and_strips() {
        let (name, value) = rewrite_param("ids", "s1_a,s1_b", None).unwrap();
        assert_eq!(name, "Ids");
        assert_eq!(value, "a,b");
    }

    #[test]
    fn userid_replaced_with_backend_user_id() {
        let result = rewrite_param("userid", "s1_client-user", Some("backend-user-1"));
        assert_eq!(result, Some(("UserId".to_string(), "backend-user-1".to_string())));
    }

    #[test]
    fn userid_dropped_when_no_mapping() {
        assert!(rewrite_param("userid", "s1_client-user", None).is_none());
    }

    #[test]
    fn apikey_is_never_forwarded() {
        assert!(rewrite_param("apikey", "secret", None).is_none());
        assert!(rewrite_param("ApiKey", "secret", None).is_none());
    }

    #[test]
    fn extract_pagination_reads_start_index_and_limit() {
        let pairs = vec![
            ("startIndex".to_string(), "20".to_string()),
            ("limit".to_string(), "10".to_string()),
        ];
        assert_eq!(extract_pagination(&pairs), (20, Some(10)));
    }

    #[test]
    fn extract_pagination_defaults_when_absent() {
        let pairs = vec![("Recursive".to_string(), "true".to_string())];
        assert_eq!(extract_pagination(&pairs), (0, None));
    }

    #[test]
    fn strip_pagination_removes_start_index_and_limit() {
        let pairs = vec![
            ("StartIndex".to_string(), "0".to_string()),
            ("Limit".to_string(), "50".to_string()),
            ("Recursive".to_string(), "true".to_string()),
        ];
        let stripped = strip_pagination(pairs);
        assert_eq!(stripped.len(), 1);
        assert_eq!(stripped[0].0, "Recursive");
    }
}
