//! Request/response shapes shared by the executor, the transport adapters and
//! the orchestrator.

use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::{HeaderMap, HeaderName, HeaderValue, Method};
use url::Url;

/// What the caller expects back from a successful exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expect {
    /// Any 2xx response is accepted as-is.
    Any,
    /// 2xx with a JSON/JavaScript content type; anything else is an
    /// application-level rejection.
    Json,
}

/// One logical request issued through the executor.
#[derive(Debug, Clone)]
pub struct RequestSpec {
    pub method: Method,
    pub url: Url,
    pub query: Vec<(String, String)>,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
    pub with_session: bool,
    pub expect: Expect,
}

impl RequestSpec {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            query: Vec::new(),
            headers: HeaderMap::new(),
            body: None,
            with_session: true,
            expect: Expect::Json,
        }
    }

    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post(url: Url) -> Self {
        Self::new(Method::POST, url)
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Requests that must not carry (or wait for) the session cookie jar.
    pub fn without_session(mut self) -> Self {
        self.with_session = false;
        self
    }

    pub fn expecting(mut self, expect: Expect) -> Self {
        self.expect = expect;
        self
    }

    /// URL with the query parameters appended.
    pub fn full_url(&self) -> Url {
        let mut url = self.url.clone();
        if !self.query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (name, value) in &self.query {
                pairs.append_pair(name, value);
            }
        }
        url
    }

    /// Materialise a single wire request, merging in per-attempt headers.
    pub fn to_transport(&self, extra_headers: &HeaderMap) -> TransportRequest {
        let mut headers = self.headers.clone();
        for (name, value) in extra_headers {
            headers.insert(name.clone(), value.clone());
        }
        TransportRequest {
            method: self.method.clone(),
            url: self.full_url(),
            headers,
            body: self.body.clone(),
        }
    }
}

/// Fully formed HTTP request handed to a [`TrendsTransport`](super::TrendsTransport).
#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
}

/// Minimal response representation returned by the transport abstraction.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub url: Url,
}

impl TransportResponse {
    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
    }

    /// Whether the body is declared as JSON or JavaScript.
    pub fn is_json_like(&self) -> bool {
        self.content_type()
            .map(|value| {
                let value = value.to_ascii_lowercase();
                value.contains("application/json")
                    || value.contains("application/javascript")
                    || value.contains("text/javascript")
            })
            .unwrap_or(false)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Values of every `Set-Cookie` header.
    pub fn set_cookies(&self) -> impl Iterator<Item = &str> {
        self.headers
            .get_all(http::header::SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
    }
}
