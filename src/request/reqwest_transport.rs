//! Reqwest-based implementation of the `TrendsTransport` trait.
//!
//! Keeps one `reqwest::Client` per proxy endpoint so connection pools are
//! never shared between different egress routes.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tokio::sync::Mutex;

use super::{TransportError, TransportRequest, TransportResponse, TrendsTransport};

/// Reqwest-backed transport with a client pool keyed by proxy endpoint.
pub struct ReqwestTransport {
    connect_timeout: Duration,
    timeout: Duration,
    clients: Mutex<HashMap<Option<String>, Client>>,
}

impl ReqwestTransport {
    pub fn new(connect_timeout: Duration, timeout: Duration) -> Self {
        Self {
            connect_timeout,
            timeout,
            clients: Mutex::new(HashMap::new()),
        }
    }

    async fn client(&self, proxy: Option<&str>) -> Result<Client, TransportError> {
        let mut guard = self.clients.lock().await;
        let key = proxy.map(|p| p.to_string());
        if let Some(client) = guard.get(&key) {
            return Ok(client.clone());
        }

        let mut builder = Client::builder()
            .connect_timeout(self.connect_timeout)
            .timeout(self.timeout);

        if let Some(endpoint) = proxy {
            // unparseable endpoints are reported like unreachable ones
            let proxy = reqwest::Proxy::all(endpoint)
                .map_err(|err| TransportError::Proxy(format!("{endpoint}: {err}")))?;
            builder = builder.proxy(proxy);
        }

        let client = builder
            .build()
            .map_err(|err| TransportError::InvalidRequest(err.to_string()))?;
        guard.insert(key, client.clone());
        Ok(client)
    }
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new(Duration::from_secs(2), Duration::from_secs(5))
    }
}

#[async_trait]
impl TrendsTransport for ReqwestTransport {
    async fn send(
        &self,
        request: &TransportRequest,
        proxy: Option<&str>,
    ) -> Result<TransportResponse, TransportError> {
        let client = self.client(proxy).await?;

        let mut builder = client
            .request(request.method.clone(), request.url.as_str())
            .headers(request.headers.clone());
        if let Some(ref body) = request.body {
            builder = builder.body(body.clone());
        }

        let response = builder
            .send()
            .await
            .map_err(|err| map_error(&err, proxy))?;

        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let url = response.url().clone();
        let body = response
            .bytes()
            .await
            .map_err(|err| map_error(&err, proxy))?;

        Ok(TransportResponse {
            status,
            headers,
            body,
            url,
        })
    }
}

fn map_error(err: &reqwest::Error, proxy: Option<&str>) -> TransportError {
    if err.is_timeout() {
        return TransportError::Timeout;
    }
    if err.is_builder() {
        return TransportError::InvalidRequest(err.to_string());
    }
    if err.is_connect() {
        return match proxy {
            Some(endpoint) => TransportError::Proxy(format!("{endpoint}: {err}")),
            None => TransportError::Connect(err.to_string()),
        };
    }
    TransportError::Network(err.to_string())
}
