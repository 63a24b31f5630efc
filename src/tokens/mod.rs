//! Widget token negotiation.
//!
//! The explore endpoint answers a [`QuerySpec`] with a list of widgets, each
//! carrying the token and request blob that unlock one data call. The
//! resulting [`TokenSet`] owns the query it was derived from so data calls can
//! never mix tokens of one query with parameters of another.

use std::sync::Arc;

use http::HeaderMap;
use serde::Deserialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::endpoints::{self, Locale};
use crate::error::{TrendsError, TrendsResult};
use crate::modules::session::SessionStore;
use crate::query::QuerySpec;
use crate::request::RequestExecutor;

pub const TIMESERIES_WIDGET: &str = "TIMESERIES";
pub const GEO_MAP_WIDGET: &str = "GEO_MAP";
pub const RELATED_TOPICS_WIDGET: &str = "RELATED_TOPICS";
pub const RELATED_QUERIES_WIDGET: &str = "RELATED_QUERIES";

/// One widget of an explore response.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Widget {
    pub id: String,
    pub token: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub request: Value,
}

impl Widget {
    /// Keyword a related-topics/queries widget is restricted to, or `""`.
    pub fn keyword(&self) -> &str {
        self.request
            .pointer("/restriction/complexKeywordsRestriction/keyword/0/value")
            .and_then(Value::as_str)
            .unwrap_or("")
    }
}

#[derive(Debug, Deserialize)]
struct ExploreResponse {
    #[serde(default)]
    widgets: Option<Vec<Widget>>,
}

/// Tokens derived from, and only valid for, one [`QuerySpec`].
#[derive(Debug, Clone, PartialEq)]
pub struct TokenSet {
    query: QuerySpec,
    time_series: Option<Widget>,
    region_map: Option<Widget>,
    related_topics: Vec<Widget>,
    related_queries: Vec<Widget>,
    others: Vec<Widget>,
}

impl TokenSet {
    /// Sort widgets by id. Fails when the list is empty.
    pub fn from_widgets(query: QuerySpec, widgets: Vec<Widget>) -> TrendsResult<Self> {
        if widgets.is_empty() {
            return Err(TrendsError::TokenNegotiationFailed(
                "explore response contained no widgets".into(),
            ));
        }

        let mut set = Self {
            query,
            time_series: None,
            region_map: None,
            related_topics: Vec::new(),
            related_queries: Vec::new(),
            others: Vec::new(),
        };

        for widget in widgets {
            match widget.id.as_str() {
                TIMESERIES_WIDGET => set.time_series = Some(widget),
                GEO_MAP_WIDGET if set.region_map.is_none() => set.region_map = Some(widget),
                RELATED_TOPICS_WIDGET => set.related_topics.push(widget),
                RELATED_QUERIES_WIDGET => set.related_queries.push(widget),
                _ => set.others.push(widget),
            }
        }

        Ok(set)
    }

    /// Parse a decoded explore body.
    pub fn from_explore(query: QuerySpec, body: Value) -> TrendsResult<Self> {
        let response: ExploreResponse = serde_json::from_value(body)
            .map_err(|err| TrendsError::TokenNegotiationFailed(err.to_string()))?;
        let widgets = response.widgets.ok_or_else(|| {
            TrendsError::TokenNegotiationFailed("explore response has no widget list".into())
        })?;
        Self::from_widgets(query, widgets)
    }

    pub fn query(&self) -> &QuerySpec {
        &self.query
    }

    pub fn time_series(&self) -> Option<&Widget> {
        self.time_series.as_ref()
    }

    pub fn region_map(&self) -> Option<&Widget> {
        self.region_map.as_ref()
    }

    pub fn related_topics(&self) -> &[Widget] {
        &self.related_topics
    }

    pub fn related_queries(&self) -> &[Widget] {
        &self.related_queries
    }

    pub fn others(&self) -> &[Widget] {
        &self.others
    }

    pub(crate) fn require_time_series(&self) -> TrendsResult<&Widget> {
        self.time_series.as_ref().ok_or_else(|| missing(TIMESERIES_WIDGET))
    }

    pub(crate) fn require_region_map(&self) -> TrendsResult<&Widget> {
        self.region_map.as_ref().ok_or_else(|| missing(GEO_MAP_WIDGET))
    }
}

fn missing(widget: &str) -> TrendsError {
    TrendsError::TokenNegotiationFailed(format!("no {widget} widget for this query"))
}

/// Fetches fresh token sets; nothing is cached between calls.
pub struct TokenNegotiator {
    executor: Arc<RequestExecutor>,
    session: Arc<SessionStore>,
    locale: Locale,
    headers: HeaderMap,
}

impl TokenNegotiator {
    pub fn new(
        executor: Arc<RequestExecutor>,
        session: Arc<SessionStore>,
        locale: Locale,
        headers: HeaderMap,
    ) -> Self {
        Self {
            executor,
            session,
            locale,
            headers,
        }
    }

    pub async fn negotiate(
        &self,
        query: &QuerySpec,
        cancel: &CancellationToken,
    ) -> TrendsResult<TokenSet> {
        let request = endpoints::explore_request(&self.locale, query)?;
        let headers = self.session.authorize(&self.headers, cancel).await?;
        let response = self.executor.execute(&request.spec, &headers, cancel).await?;
        let body = request
            .decode(&response)
            .map_err(|err| TrendsError::TokenNegotiationFailed(err.to_string()))?;
        TokenSet::from_explore(query.clone(), body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn query() -> QuerySpec {
        QuerySpec::builder(["pizza", "bagel"]).build().unwrap()
    }

    fn explore_body() -> Value {
        json!({
            "widgets": [
                {"id": "TIMESERIES", "token": "t1", "title": "Interest over time", "request": {"time": "today 5-y"}},
                {"id": "GEO_MAP", "token": "g1", "request": {}},
                {"id": "GEO_MAP", "token": "g2", "request": {}},
                {"id": "RELATED_TOPICS", "token": "rt1", "request": {
                    "restriction": {"complexKeywordsRestriction": {"keyword": [{"type": "BROAD", "value": "pizza"}]}}
                }},
                {"id": "RELATED_QUERIES", "token": "rq1", "request": {}},
                {"id": "RELATED_QUERIES", "token": "rq2", "request": {}},
                {"id": "SOMETHING_NEW", "token": "x", "request": {}}
            ]
        })
    }

    #[test]
    fn sorts_widgets_by_id() {
        let tokens = TokenSet::from_explore(query(), explore_body()).unwrap();
        assert_eq!(tokens.time_series().unwrap().token, "t1");
        assert_eq!(tokens.region_map().unwrap().token, "g1");
        assert_eq!(tokens.related_topics()[0].keyword(), "pizza");
        assert_eq!(tokens.related_queries().len(), 2);
        assert_eq!(tokens.related_queries()[1].keyword(), "");
        assert_eq!(tokens.others().len(), 1);
        assert_eq!(tokens.query(), &query());
    }

    #[test]
    fn empty_or_missing_widget_list_fails() {
        for body in [json!({"widgets": []}), json!({"other": 1})] {
            let err = TokenSet::from_explore(query(), body).unwrap_err();
            assert!(matches!(err, TrendsError::TokenNegotiationFailed(_)));
        }
    }

    #[test]
    fn missing_widget_is_reported_by_name() {
        let tokens = TokenSet::from_widgets(
            query(),
            vec![Widget {
                id: "GEO_MAP".into(),
                token: "g".into(),
                title: String::new(),
                request: json!({}),
            }],
        )
        .unwrap();
        let err = tokens.require_time_series().unwrap_err();
        assert!(err.to_string().contains("TIMESERIES"));
    }
}
