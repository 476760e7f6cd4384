//! Request/response JSON translation.
//!
//! Walks Jellyfin JSON payloads and rewrites identifier fields between the
//! client-facing proxy namespace (`prefix_backendID`) and a single backend's
//! bare namespace.

use serde_json::Value;

use crate::idcodec;

/// Rewrite a backend's JSON response into the proxy's namespace.
///
/// Every key ending in `Id` (but not `ServerId`) gets its string value
/// prefixed; `ServerId` is replaced with the proxy's own server id;
/// optionally injects `BackendId`/`BackendName`/`BackendUrl` onto every
/// object that carries a non-empty `Id`.
pub fn rewrite_response(
    value: &mut Value,
    prefix: &str,
    proxy_server_id: &str,
    backend_id: &str,
    backend_name: &str,
    backend_url: &str,
    inject_backend_info: bool,
) {
    walk_response(
        value,
        prefix,
        proxy_server_id,
        backend_id,
        backend_name,
        backend_url,
        inject_backend_info,
    );
}

fn walk_response(
    value: &mut Value,
    prefix: &str,
    proxy_server_id: &str,
    backend_id: &str,
    backend_name: &str,
    backend_url: &str,
    inject_backend_info: bool,
) {
    match value {
        Value::Object(map) => {
            let mut has_id = false;
            for (key, v) in map.iter_mut() {
                if key == "ServerId" {
                    *v = Value::String(proxy_server_id.to_string());
                    continue;
                }
                if key.ends_with("Id") && key != "ServerId" {
                    if let Value::String(s) = v {
                        if !s.is_empty() {
                            *v = Value::String(idcodec::encode(prefix, s));
                        }
                    }
                    if key == "Id" && matches!(v, Value::String(s) if !s.is_empty()) {
                        has_id = true;
                    }
                }
                walk_response(
                    v,
                    prefix,
                    proxy_server_id,
                    backend_id,
                    backend_name,
                    backend_url,
                    inject_backend_info,
                );
            }
            if inject_backend_info && has_id {
                map.insert("BackendId".into(), Value::String(backend_id.to_string()));
                map.insert("BackendName".into(), Value::String(backend_name.to_string()));
                map.insert("BackendUrl".into(), Value::String(backend_url.to_string()));
            }
        }
        Value::Array(items) => {
            for item in items.iter_mut() {
                walk_response(
                    item,
                    prefix,
                    proxy_server_id,
                    backend_id,
                    backend_name,
                    backend_url,
                    inject_backend_info,
                );
            }
        }
        _ => {}
    }
}

/// Rewrite a client request body before forwarding it to a single backend:
/// strip the proxy prefix from every `*Id` field (except `ServerId`), and
/// from each element of a comma-separated `Ids` value.
pub fn rewrite_request(value: &mut Value) {
    walk_request(value);
}

fn walk_request(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for (key, v) in map.iter_mut() {
                if key == "ServerId" {
                    continue;
                }
                if key.eq_ignore_ascii_case("Ids") {
                    if let Value::String(s) = v {
                        let rewritten = s
                            .split(',')
                            .map(|part| idcodec::decode_lenient(part).1)
                            .collect::<Vec<_>>()
                            .join(",");
                        *v = Value::String(rewritten);
                    }
                } else if key.ends_with("Id") || key.ends_with("id") {
                    if let Value::String(s) = v {
                        if !s.is_empty() {
                            *v = Value::String(idcodec::decode_lenient(s).1.to_string());
                        }
                    }
                }
                walk_request(v);
            }
        }
        Value::Array(items) => {
            for item in items.iter_mut() {
                walk_request(item);
            }
        }
        _ => {}
    }
}
