//! High level client orchestration.
//!
//! Wires the proxy pool, the session store, the token negotiator and the
//! resilient executor together behind one cloneable handle exposing the
//! provider's data calls.

use std::sync::Arc;
use std::time::Duration;

use http::header::ACCEPT_LANGUAGE;
use http::{HeaderMap, HeaderValue};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::config::{ConfigError, TrendsConfig};
use crate::endpoints::{self, EndpointRequest, Locale, RegionOptions};
use crate::error::{TrendsError, TrendsResult};
use crate::modules::events::{EventDispatcher, EventHandler, LoggingHandler};
use crate::modules::proxy::ProxyPool;
use crate::modules::session::{Session, SessionStore};
use crate::query::{QuerySpec, QuerySpecBuilder};
use crate::request::{
	RequestExecutor, RequestSpec, ReqwestTransport, TransportResponse, TrendsTransport,
};
use crate::tokens::{TokenNegotiator, TokenSet, Widget};

/// Body of one related-topics/queries widget.
#[derive(Debug, Clone, PartialEq)]
pub struct RelatedResult {
	pub keyword: String,
	pub body: Value,
}

/// Fluent builder for [`TrendsClient`].
pub struct TrendsClientBuilder {
	config: TrendsConfig,
	transport: Option<Arc<dyn TrendsTransport>>,
	handlers: Vec<Arc<dyn EventHandler>>,
	logging: bool,
	cancel: Option<CancellationToken>,
}

impl TrendsClientBuilder {
	pub fn new() -> Self {
		Self {
			config: TrendsConfig::default(),
			transport: None,
			handlers: Vec::new(),
			logging: true,
			cancel: None,
		}
	}

	pub fn with_config(mut self, config: TrendsConfig) -> Self {
		self.config = config;
		self
	}

	pub fn with_hl(mut self, hl: impl Into<String>) -> Self {
		self.config.hl = hl.into();
		self
	}

	pub fn with_tz(mut self, tz: i32) -> Self {
		self.config.tz = tz;
		self
	}

	pub fn with_geo(mut self, geo: impl Into<String>) -> Self {
		self.config.geo = geo.into();
		self
	}

	pub fn with_timeout(mut self, timeout: Duration) -> Self {
		self.config.timeout = timeout;
		self
	}

	pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
		self.config.connect_timeout = timeout;
		self
	}

	pub fn with_retries(mut self, retries: u32) -> Self {
		self.config.retries = retries;
		self
	}

	pub fn with_backoff_factor(mut self, factor: f64) -> Self {
		self.config.backoff_factor = factor;
		self
	}

	pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
		self.config.backoff_multiplier = multiplier;
		self
	}

	pub fn with_jitter(mut self, jitter: Duration) -> Self {
		self.config.jitter = jitter;
		self
	}

	pub fn with_proxies<I, S>(mut self, proxies: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.config.proxies = proxies.into_iter().map(Into::into).collect();
		self
	}

	pub fn with_max_proxy_failures(mut self, max: u32) -> Self {
		self.config.max_proxy_failures = Some(max);
		self
	}

	/// Replace the reqwest transport, e.g. with an in-memory one in tests.
	pub fn with_transport(mut self, transport: Arc<dyn TrendsTransport>) -> Self {
		self.transport = Some(transport);
		self
	}

	pub fn with_event_handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
		self.handlers.push(handler);
		self
	}

	pub fn disable_logging(mut self) -> Self {
		self.logging = false;
		self
	}

	pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
		self.cancel = Some(token);
		self
	}

	pub fn build(self) -> TrendsResult<TrendsClient> {
		TrendsClient::from_parts(self)
	}
}

impl Default for TrendsClientBuilder {
	fn default() -> Self {
		Self::new()
	}
}

/// State shared by every handle cloned from one client.
struct TrendsInner {
	config: TrendsConfig,
	locale: Locale,
	base_headers: HeaderMap,
	executor: Arc<RequestExecutor>,
	session: Arc<SessionStore>,
	negotiator: TokenNegotiator,
}

/// Main client. Cloning is cheap and clones share session, proxy pool and
/// executor.
#[derive(Clone)]
pub struct TrendsClient {
	inner: Arc<TrendsInner>,
	cancel: CancellationToken,
}

impl TrendsClient {
	/// Construct a client with default configuration.
	pub fn new() -> TrendsResult<Self> {
		TrendsClientBuilder::new().build()
	}

	/// Obtain a builder to customise the client instance.
	pub fn builder() -> TrendsClientBuilder {
		TrendsClientBuilder::new()
	}

	fn from_parts(builder: TrendsClientBuilder) -> TrendsResult<Self> {
		let TrendsClientBuilder {
			config,
			transport,
			handlers,
			logging,
			cancel,
		} = builder;
		config.validate()?;

		let locale = config.locale();
		let mut base_headers = HeaderMap::new();
		base_headers.insert(
			ACCEPT_LANGUAGE,
			HeaderValue::from_str(&config.hl).map_err(|_| ConfigError::Invalid {
				field: "hl",
				reason: "not a valid header value".into(),
			})?,
		);

		let mut events = EventDispatcher::new();
		if logging {
			events.register_handler(Arc::new(LoggingHandler));
		}
		for handler in handlers {
			events.register_handler(handler);
		}

		let transport = transport.unwrap_or_else(|| {
			Arc::new(ReqwestTransport::new(config.connect_timeout, config.timeout))
		});
		let pool = Arc::new(ProxyPool::new(config.proxies.iter().cloned()));
		let executor = Arc::new(
			RequestExecutor::new(transport, pool, config.retry_policy())
				.with_timeout(config.timeout)
				.with_max_proxy_failures(config.proxy_failure_budget())
				.with_events(Arc::new(events)),
		);

		let session = Arc::new(
			SessionStore::new(executor.clone(), endpoints::cookie_request(&locale)?)
				.with_headers(base_headers.clone()),
		);
		let negotiator = TokenNegotiator::new(
			executor.clone(),
			session.clone(),
			locale.clone(),
			base_headers.clone(),
		);

		Ok(Self {
			inner: Arc::new(TrendsInner {
				config,
				locale,
				base_headers,
				executor,
				session,
				negotiator,
			}),
			cancel: cancel.unwrap_or_default(),
		})
	}

	pub fn config(&self) -> &TrendsConfig {
		&self.inner.config
	}

	pub fn locale(&self) -> &Locale {
		&self.inner.locale
	}

	pub fn proxy_pool(&self) -> &Arc<ProxyPool> {
		self.inner.executor.pool()
	}

	/// Token observed by operations issued through this handle.
	pub fn cancellation_token(&self) -> &CancellationToken {
		&self.cancel
	}

	/// Handle sharing all state with `self` whose operations stop with
	/// [`TrendsError::Cancelled`] once `token` is cancelled.
	pub fn with_cancellation(&self, token: CancellationToken) -> Self {
		Self {
			inner: self.inner.clone(),
			cancel: token,
		}
	}

	/// Query builder preloaded with the configured geography.
	pub fn query<I, S>(&self, keywords: I) -> QuerySpecBuilder
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		QuerySpec::builder(keywords).geo(self.inner.config.geo.clone())
	}

	/// Acquire the session cookie jar unless one is already held.
	pub async fn ensure_session(&self) -> TrendsResult<Arc<Session>> {
		self.inner.session.ensure_session(&self.cancel).await
	}

	pub async fn session(&self) -> Option<Arc<Session>> {
		self.inner.session.current().await
	}

	/// Forget the session; the next session-bound call acquires a new one.
	pub async fn reset_session(&self) {
		self.inner.session.invalidate().await;
	}

	/// Fetch a fresh token set for `query`.
	pub async fn negotiate(&self, query: &QuerySpec) -> TrendsResult<TokenSet> {
		self.inner.negotiator.negotiate(query, &self.cancel).await
	}

	/// Run one request through the executor, attaching the session when the
	/// request asks for it.
	pub async fn execute(&self, spec: &RequestSpec) -> TrendsResult<TransportResponse> {
		let headers = if spec.with_session {
			self.inner
				.session
				.authorize(&self.inner.base_headers, &self.cancel)
				.await?
		} else {
			self.inner.base_headers.clone()
		};
		self.inner.executor.execute(spec, &headers, &self.cancel).await
	}

	/// Execute and decode an endpoint request.
	pub async fn fetch(&self, request: &EndpointRequest) -> TrendsResult<Value> {
		let response = self.execute(&request.spec).await?;
		request.decode(&response)
	}

	pub async fn interest_over_time(&self, tokens: &TokenSet) -> TrendsResult<Value> {
		let widget = tokens.require_time_series()?;
		self.fetch(&endpoints::interest_over_time_request(widget, &self.inner.locale)?)
			.await
	}

	pub async fn multirange_interest_over_time(&self, tokens: &TokenSet) -> TrendsResult<Value> {
		let widget = tokens.require_time_series()?;
		self.fetch(&endpoints::multirange_interest_over_time_request(
			widget,
			&self.inner.locale,
		)?)
		.await
	}

	pub async fn interest_by_region(
		&self,
		tokens: &TokenSet,
		options: RegionOptions,
	) -> TrendsResult<Value> {
		let widget = tokens.require_region_map()?;
		let request = endpoints::interest_by_region_request(
			widget,
			tokens.query().geo(),
			options,
			&self.inner.locale,
		)?;
		self.fetch(&request).await
	}

	pub async fn related_topics(&self, tokens: &TokenSet) -> TrendsResult<Vec<RelatedResult>> {
		self.related(tokens.related_topics()).await
	}

	pub async fn related_queries(&self, tokens: &TokenSet) -> TrendsResult<Vec<RelatedResult>> {
		self.related(tokens.related_queries()).await
	}

	async fn related(&self, widgets: &[Widget]) -> TrendsResult<Vec<RelatedResult>> {
		let mut results = Vec::with_capacity(widgets.len());
		for widget in widgets {
			let request = endpoints::related_searches_request(widget, &self.inner.locale)?;
			results.push(RelatedResult {
				keyword: widget.keyword().to_string(),
				body: self.fetch(&request).await?,
			});
		}
		Ok(results)
	}

	/// Hot searches for a country name such as `united_states`.
	pub async fn trending_searches(&self, pn: &str) -> TrendsResult<Value> {
		let mut body = self.fetch(&endpoints::trending_searches_request()?).await?;
		body.get_mut(pn).map(Value::take).ok_or_else(|| {
			TrendsError::MalformedResponse(format!("no trending searches for {pn:?}"))
		})
	}

	pub async fn today_searches(&self, pn: &str) -> TrendsResult<Value> {
		self.fetch(&endpoints::today_searches_request(pn, &self.inner.locale)?)
			.await
	}

	pub async fn realtime_trending_searches(
		&self,
		pn: &str,
		category: &str,
		count: u32,
	) -> TrendsResult<Value> {
		self.fetch(&endpoints::realtime_trending_searches_request(
			pn,
			category,
			count,
			&self.inner.locale,
		)?)
		.await
	}

	pub async fn top_charts(&self, year: i32, geo: &str) -> TrendsResult<Value> {
		self.fetch(&endpoints::top_charts_request(year, geo, &self.inner.locale)?)
			.await
	}

	pub async fn suggestions(&self, keyword: &str) -> TrendsResult<Value> {
		self.fetch(&endpoints::suggestions_request(keyword, &self.inner.locale)?)
			.await
	}

	pub async fn categories(&self) -> TrendsResult<Value> {
		self.fetch(&endpoints::categories_request(&self.inner.locale)?)
			.await
	}
}
