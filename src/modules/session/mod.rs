//! Session cookie store.
//!
//! The session is either present and complete or absent; it is acquired
//! lazily through the request executor and concurrent first users converge on
//! a single acquisition because the slot stays locked for its duration.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use http::header::COOKIE;
use http::{HeaderMap, HeaderValue};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::error::{TrendsError, TrendsResult};
use crate::modules::events::{SessionEvent, TrendsEvent};
use crate::request::{RequestExecutor, RequestSpec, TransportResponse};

/// Cookie jar captured from the cookie-issuing endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    cookies: BTreeMap<String, String>,
    acquired_at: DateTime<Utc>,
}

impl Session {
    pub fn new(cookies: BTreeMap<String, String>) -> TrendsResult<Self> {
        if cookies.is_empty() {
            return Err(TrendsError::SessionAcquisitionFailed(
                "cookie endpoint returned no cookies".into(),
            ));
        }
        Ok(Self {
            cookies,
            acquired_at: Utc::now(),
        })
    }

    /// Build a session from the `Set-Cookie` headers of `response`.
    pub fn from_response(response: &TransportResponse) -> TrendsResult<Self> {
        let cookies = response
            .set_cookies()
            .filter_map(parse_set_cookie)
            .collect::<BTreeMap<_, _>>();
        Self::new(cookies)
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    pub fn cookies(&self) -> &BTreeMap<String, String> {
        &self.cookies
    }

    pub fn acquired_at(&self) -> DateTime<Utc> {
        self.acquired_at
    }

    /// `Cookie` request header value (`a=1; b=2`).
    pub fn cookie_header(&self) -> TrendsResult<HeaderValue> {
        let value = self
            .cookies
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join("; ");
        HeaderValue::from_str(&value).map_err(|_| {
            TrendsError::SessionAcquisitionFailed("cookie jar is not a valid header".into())
        })
    }
}

/// `NAME=VALUE; attr...` -> `(NAME, VALUE)`.
fn parse_set_cookie(raw: &str) -> Option<(String, String)> {
    let pair = raw.split(';').next()?;
    let (name, value) = pair.split_once('=')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    Some((name.to_string(), value.trim().to_string()))
}

/// Lazily populated, internally synchronised session slot.
pub struct SessionStore {
    executor: Arc<RequestExecutor>,
    request: RequestSpec,
    headers: HeaderMap,
    slot: Mutex<Option<Arc<Session>>>,
}

impl SessionStore {
    /// `request` is the call to the cookie-issuing endpoint; it is always sent
    /// without session cookies.
    pub fn new(executor: Arc<RequestExecutor>, request: RequestSpec) -> Self {
        Self {
            executor,
            request: request.without_session(),
            headers: HeaderMap::new(),
            slot: Mutex::new(None),
        }
    }

    /// Headers added to the cookie request (locale and the like).
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// Return the current session, fetching one first if none is held.
    pub async fn ensure_session(&self, cancel: &CancellationToken) -> TrendsResult<Arc<Session>> {
        let mut slot = tokio::select! {
            _ = cancel.cancelled() => return Err(TrendsError::Cancelled),
            guard = self.slot.lock() => guard,
        };
        if let Some(session) = slot.as_ref() {
            return Ok(session.clone());
        }

        let response = self
            .executor
            .execute(&self.request, &self.headers, cancel)
            .await?;
        let session = Arc::new(Session::from_response(&response)?);

        self.executor
            .events()
            .dispatch(TrendsEvent::SessionAcquired(SessionEvent {
                cookie_names: session.cookies().keys().cloned().collect(),
                timestamp: session.acquired_at(),
            }));

        *slot = Some(session.clone());
        Ok(session)
    }

    /// `base` plus the session `Cookie` header, acquiring the session first if
    /// needed.
    pub async fn authorize(
        &self,
        base: &HeaderMap,
        cancel: &CancellationToken,
    ) -> TrendsResult<HeaderMap> {
        let session = self.ensure_session(cancel).await?;
        let mut headers = base.clone();
        headers.insert(COOKIE, session.cookie_header()?);
        Ok(headers)
    }

    /// Session currently held, without fetching.
    pub async fn current(&self) -> Option<Arc<Session>> {
        self.slot.lock().await.clone()
    }

    /// Drop the held session; the next `ensure_session` fetches a new one.
    pub async fn invalidate(&self) {
        self.slot.lock().await.take();
    }
}
