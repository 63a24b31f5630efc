//! Scripted in-memory transport shared by the integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http::header::{CONTENT_TYPE, SET_COOKIE};
use http::{HeaderMap, HeaderValue, Method};
use trendscraper_rs::{TransportError, TransportRequest, TransportResponse, TrendsTransport};
use url::Url;

pub type Outcome = Result<TransportResponse, TransportError>;

/// What the scripted transport does for one call.
pub enum Reply {
    Now(Outcome),
    After(Duration, Outcome),
}

impl From<Outcome> for Reply {
    fn from(outcome: Outcome) -> Self {
        Reply::Now(outcome)
    }
}

#[derive(Debug, Clone)]
pub struct Call {
    pub method: Method,
    pub url: Url,
    pub proxy: Option<String>,
    pub headers: HeaderMap,
}

impl Call {
    pub fn param(&self, name: &str) -> Option<String> {
        self.url
            .query_pairs()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.into_owned())
    }
}

type Handler = dyn Fn(&TransportRequest, Option<&str>, usize) -> Reply + Send + Sync;

pub struct MockTransport {
    handler: Box<Handler>,
    calls: Mutex<Vec<Call>>,
}

impl MockTransport {
    /// `handler` receives the request, the proxy and the zero-based index of
    /// the call.
    pub fn new<F>(handler: F) -> Arc<Self>
    where
        F: Fn(&TransportRequest, Option<&str>, usize) -> Reply + Send + Sync + 'static,
    {
        Arc::new(Self {
            handler: Box::new(handler),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn count_path(&self, path: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|call| call.url.path() == path)
            .count()
    }

    pub fn proxies(&self) -> Vec<Option<String>> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|call| call.proxy.clone())
            .collect()
    }
}

#[async_trait]
impl TrendsTransport for MockTransport {
    async fn send(
        &self,
        request: &TransportRequest,
        proxy: Option<&str>,
    ) -> Result<TransportResponse, TransportError> {
        let index = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(Call {
                method: request.method.clone(),
                url: request.url.clone(),
                proxy: proxy.map(str::to_string),
                headers: request.headers.clone(),
            });
            calls.len() - 1
        };
        match (self.handler)(request, proxy, index) {
            Reply::Now(outcome) => outcome,
            Reply::After(delay, outcome) => {
                tokio::time::sleep(delay).await;
                outcome
            }
        }
    }
}

pub const COOKIE_PATH: &str = "/";
pub const EXPLORE_PATH: &str = "/trends/api/explore";

pub fn response(
    status: u16,
    content_type: &'static str,
    body: impl Into<Bytes>,
) -> TransportResponse {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    TransportResponse {
        status,
        headers,
        body: body.into(),
        url: Url::parse("https://trends.google.com/").unwrap(),
    }
}

pub fn json(body: impl Into<String>) -> Outcome {
    Ok(response(200, "application/json; charset=utf-8", body.into()))
}

pub fn status(code: u16) -> Outcome {
    Ok(response(code, "text/html", "<html>error</html>"))
}

pub fn cookies() -> Outcome {
    let mut response = response(200, "text/html", "<html></html>");
    response.headers.append(
        SET_COOKIE,
        HeaderValue::from_static("NID=511=session; expires=Sun, 01-Jan-2034 00:00:00 GMT; path=/; domain=.google.com; HttpOnly"),
    );
    Ok(response)
}

/// Explore body with the XSSI prefix and one widget of every kind.
pub fn explore_body() -> String {
    format!(
        ")]}}'{}",
        serde_json::json!({
            "widgets": [
                {"id": "TIMESERIES", "token": "ts-token", "request": {"time": "today 5-y", "resolution": "WEEK"}},
                {"id": "GEO_MAP", "token": "geo-token", "request": {"geo": {}}},
                {"id": "RELATED_TOPICS", "token": "rt-pizza", "request": {
                    "restriction": {"complexKeywordsRestriction": {"keyword": [{"type": "BROAD", "value": "pizza"}]}}
                }},
                {"id": "RELATED_QUERIES", "token": "rq-pizza", "request": {
                    "restriction": {"complexKeywordsRestriction": {"keyword": [{"type": "BROAD", "value": "pizza"}]}}
                }},
                {"id": "RELATED_QUERIES", "token": "rq-bagel", "request": {
                    "restriction": {"complexKeywordsRestriction": {"keyword": [{"type": "BROAD", "value": "bagel"}]}}
                }}
            ]
        })
    )
}

/// Widget data body with the five character prefix.
pub fn widget_body(value: serde_json::Value) -> String {
    format!(")]}}',\n{value}")
}

/// Happy-path router: cookies on `/`, widgets on explore, `data` elsewhere.
pub fn route(request: &TransportRequest, data: &serde_json::Value) -> Outcome {
    match request.url.path() {
        COOKIE_PATH => cookies(),
        EXPLORE_PATH => json(explore_body()),
        _ => json(widget_body(data.clone())),
    }
}
