//! Authenticated HTTP operations against a single backend.
//!
//! Two `reqwest::Client`s are used process-wide: a bounded-timeout client for
//! JSON API calls and an effectively-unbounded one for streamed media, since
//! transcoders can take a long time to start producing bytes.

use jfp_core::{BackendId, Error, Result};
use reqwest::{Method, StatusCode};
use serde_json::Value;

use crate::health::HealthRegistry;
use crate::translator;

/// A short whitelist of response headers safe to mirror back to the client
/// when streaming media.
pub const STREAM_PASSTHROUGH_HEADERS: &[&str] = &[
    "content-type",
    "content-length",
    "content-range",
    "content-disposition",
    "accept-ranges",
    "x-content-duration",
    "cache-control",
];

#[derive(Clone)]
pub struct BackendClient {
    pub backend_id: BackendId,
    pub prefix: String,
    pub name: String,
    pub base_url: String,
    pub backend_user_id: Option<String>,
    backend_token: Option<String>,
    json_client: reqwest::Client,
    stream_client: reqwest::Client,
    health: HealthRegistry,
}

impl BackendClient {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        backend_id: BackendId,
        prefix: String,
        name: String,
        base_url: String,
        backend_user_id: Option<String>,
        backend_token: Option<String>,
        json_client: reqwest::Client,
        stream_client: reqwest::Client,
        health: HealthRegistry,
    ) -> Self {
        Self {
            backend_id,
            prefix,
            name,
            base_url,
            backend_user_id,
            backend_token,
            json_client,
            stream_client,
            health,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    fn apply_auth(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.backend_token {
            Some(token) if !token.is_empty() => builder.header("X-Emby-Token", token),
            _ => builder,
        }
    }

    /// Authenticated JSON call. Request body fields are stripped of proxy
    /// prefixes; a successful JSON response is translated into the proxy's
    /// namespace with backend-info injected.
    pub async fn proxy_json(
        &self,
        method: Method,
        path: &str,
        query: &[(String, String)],
        body: Option<Value>,
        proxy_server_id: &str,
    ) -> Result<(StatusCode, Value)> {
        let mut request_body = body;
        if let Some(ref mut b) = request_body {
            translator::rewrite_request(b);
        }

        let mut builder = self.json_client.request(method, self.url(path)).query(query);
        builder = self.apply_auth(builder);
        if let Some(b) = &request_body {
            builder = builder.json(b);
        }

        let response = builder.send().await.map_err(|e| {
            self.health.record_request_failure(self.backend_id);
            Error::backend(&self.prefix, e.to_string())
        })?;
        self.record_status(response.status());

        let status = response.status();
        let bytes = response.bytes().await.map_err(|e| Error::backend(&self.prefix, e.to_string()))?;

        if bytes.is_empty() {
            return Ok((status, Value::Null));
        }

        match serde_json::from_slice::<Value>(&bytes) {
            Ok(mut value) if status.is_success() => {
                translator::rewrite_response(
                    &mut value,
                    &self.prefix,
                    proxy_server_id,
                    &self.backend_id.to_string(),
                    &self.name,
                    &self.base_url,
                    true,
                );
                Ok((status, value))
            }
            Ok(value) => Ok((status, value)),
            Err(_) => Ok((status, Value::String(String::from_utf8_lossy(&bytes).into_owned()))),
        }
    }

    /// Like [`proxy_json`](Self::proxy_json) but skips translation entirely
    /// (used for HLS playlist text and other non-JSON payloads).
    pub async fn proxy_raw(
        &self,
        method: Method,
        path: &str,
        query: &[(String, String)],
    ) -> Result<(StatusCode, Vec<u8>, reqwest::header::HeaderMap)> {
        let mut builder = self.json_client.request(method, self.url(path)).query(query);
        builder = self.apply_auth(builder);

        let response = builder.send().await.map_err(|e| {
            self.health.record_request_failure(self.backend_id);
            Error::backend(&self.prefix, e.to_string())
        })?;
        self.record_status(response.status());

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response.bytes().await.map_err(|e| Error::backend(&self.prefix, e.to_string()))?;
        Ok((status, bytes.to_vec(), headers))
    }

    /// Open a streaming response against the backend. The caller is
    /// responsible for copying the body in chunks and applying the header
    /// whitelist; this client only constructs and dispatches the request with
    /// the generous "stream" HTTP client.
    pub async fn proxy_stream(
        &self,
        method: Method,
        path: &str,
        query: &[(String, String)],
        range_header: Option<&str>,
    ) -> Result<reqwest::Response> {
        let mut builder = self.stream_client.request(method, self.url(path)).query(query);
        builder = self.apply_auth(builder);
        if let Some(range) = range_header {
            builder = builder.header("Range", range);
        }

        let response = builder.send().await.map_err(|e| {
            self.health.record_request_failure(self.backend_id);
            Error::backend(&self.prefix, e.to_string())
        })?;
        self.record_status(response.status());
        Ok(response)
    }

    /// A completed live request only counts as a failure for circuit-breaker
    /// purposes when the backend itself reports a server error; 4xx is the
    /// backend behaving correctly (bad request, not found) and must not trip
    /// the breaker.
    fn record_status(&self, status: StatusCode) {
        if status.is_server_error() {
            self.health.record_request_failure(self.backend_id);
        } else {
            self.health.record_request_success(self.backend_id);
        }
    }

    /// Fully-qualified backend URL with the backend token injected as
    /// `ApiKey=`, for 302-redirect direct-stream mode.
    pub fn direct_url(&self, path: &str, query: &[(String, String)]) -> String {
        let mut url = reqwest::Url::parse(&self.url(path)).unwrap_or_else(|_| {
            reqwest::Url::parse(&self.base_url).expect("base_url must be a valid URL")
        });
        {
            let mut pairs = url.query_pairs_mut();
            for (k, v) in query {
                pairs.append_pair(k, v);
            }
            if let Some(token) = &self.backend_token {
                if !token.is_empty() {
                    pairs.append_pair("ApiKey", token);
                }
            }
        }
        url.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_client(token: Option<&str>) -> BackendClient {
        BackendClient::new(
            BackendId::new(),
            "s1".into(),
            "Home".into(),
            "https://jf1.example.com".into(),
            Some("backend-user-1".into()),
            token.map(|s| s.to_string()),
            reqwest::Client::new(),
            reqwest::Client::new(),
            HealthRegistry::new(),
        )
    }

    #[test]
    fn direct_url_injects_backend_token() {
        let client = test_client(Some("backend-secret"));
        let url = client.direct_url("/Videos/abc/stream", &[("static".into(), "true".into())]);
        assert!(url.contains("ApiKey=backend-secret"));
        assert!(url.contains("static=true"));
    }

    #[test]
    fn direct_url_without_token_has_no_apikey() {
        let client = test_client(None);
        let url = client.direct_url("/Videos/abc/stream", &[]);
        assert!(!url.contains("ApiKey="));
    }

    #[test]
    fn url_joins_base_and_path() {
        let client = test_client(None);
        assert_eq!(client.url("/System/Info"), "https://jf1.example.com/System/Info");
    }

    #[test]
    fn url_handles_trailing_slash_on_base() {
        let mut client = test_client(None);
        client.base_url = "https://jf1.example.com/".into();
        assert_eq!(client.url("/System/Info"), "https://jf1.example.com/System/Info");
    }
}
