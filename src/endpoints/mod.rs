//! Provider endpoints and the requests sent to them.
//!
//! Builders here are pure: they turn a locale, a query or a widget token into
//! a [`RequestSpec`] plus the number of anti-XSSI prefix characters the
//! provider puts in front of the JSON body.

use http::Method;
use serde_json::Value;
use url::Url;

use crate::error::{TrendsError, TrendsResult};
use crate::query::QuerySpec;
use crate::request::{Expect, RequestSpec, TransportResponse};
use crate::tokens::Widget;

pub const COOKIE_URL: &str = "https://trends.google.com/";
pub const EXPLORE_URL: &str = "https://trends.google.com/trends/api/explore";
pub const INTEREST_OVER_TIME_URL: &str =
    "https://trends.google.com/trends/api/widgetdata/multiline";
pub const MULTIRANGE_INTEREST_OVER_TIME_URL: &str =
    "https://trends.google.com/trends/api/widgetdata/multirange";
pub const INTEREST_BY_REGION_URL: &str =
    "https://trends.google.com/trends/api/widgetdata/comparedgeo";
pub const RELATED_SEARCHES_URL: &str =
    "https://trends.google.com/trends/api/widgetdata/relatedsearches";
pub const TRENDING_SEARCHES_URL: &str =
    "https://trends.google.com/trends/hottrends/visualize/internal/data";
pub const TOP_CHARTS_URL: &str = "https://trends.google.com/trends/api/topcharts";
pub const SUGGESTIONS_URL: &str = "https://trends.google.com/trends/api/autocomplete/";
pub const CATEGORIES_URL: &str = "https://trends.google.com/trends/api/explore/pickers/category";
pub const TODAY_SEARCHES_URL: &str = "https://trends.google.com/trends/api/dailytrends";
pub const REALTIME_TRENDING_SEARCHES_URL: &str =
    "https://trends.google.com/trends/api/realtimetrends";

/// `)]}'` in front of explore responses.
pub const EXPLORE_PREFIX_CHARS: usize = 4;
/// `)]}',` in front of widget data responses.
pub const WIDGET_PREFIX_CHARS: usize = 5;

pub const MAX_REALTIME_RESULTS: u32 = 300;
pub const REALTIME_STORY_LIMIT: u32 = 200;

/// Locale parameters shared by most calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locale {
    pub hl: String,
    pub tz: i32,
}

impl Locale {
    pub fn new(hl: impl Into<String>, tz: i32) -> Self {
        Self { hl: hl.into(), tz }
    }

    /// Country part of `hl` (`en-US` -> `US`), used by the cookie endpoint.
    pub fn country(&self) -> &str {
        let len = self.hl.len();
        if len >= 2 && self.hl.is_char_boundary(len - 2) {
            &self.hl[len - 2..]
        } else {
            &self.hl
        }
    }
}

/// Request plus the decoding hint for its body.
#[derive(Debug, Clone)]
pub struct EndpointRequest {
    pub spec: RequestSpec,
    pub trim_chars: usize,
}

impl EndpointRequest {
    fn new(spec: RequestSpec, trim_chars: usize) -> Self {
        Self { spec, trim_chars }
    }

    /// Decode a successful response to this request.
    pub fn decode(&self, response: &TransportResponse) -> TrendsResult<Value> {
        decode_body(&response.body, self.trim_chars)
    }
}

/// Geographic granularity for interest-by-region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Resolution {
    #[default]
    Country,
    Region,
    City,
    Dma,
}

impl Resolution {
    pub fn as_param(&self) -> &'static str {
        match self {
            Resolution::Country => "COUNTRY",
            Resolution::Region => "REGION",
            Resolution::City => "CITY",
            Resolution::Dma => "DMA",
        }
    }

    /// Whether the provider honours this resolution for `geo`.
    pub fn applies_to(&self, geo: &str) -> bool {
        match (geo, self) {
            ("", _) => true,
            ("US", Resolution::Dma | Resolution::City | Resolution::Region) => true,
            (geo, Resolution::City | Resolution::Region) => geo.len() == 2,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RegionOptions {
    pub resolution: Resolution,
    pub include_low_volume: bool,
}

/// Drop `trim_chars` leading characters and parse the rest as JSON.
pub fn decode_body(body: &[u8], trim_chars: usize) -> TrendsResult<Value> {
    let text = String::from_utf8_lossy(body);
    let start = text
        .char_indices()
        .nth(trim_chars)
        .map(|(index, _)| index)
        .unwrap_or(text.len());
    serde_json::from_str(&text[start..])
        .map_err(|err| TrendsError::MalformedResponse(err.to_string()))
}

pub fn cookie_request(locale: &Locale) -> TrendsResult<RequestSpec> {
    Ok(RequestSpec::get(Url::parse(COOKIE_URL)?)
        .with_param("geo", locale.country())
        .without_session()
        .expecting(Expect::Any))
}

pub fn explore_request(locale: &Locale, query: &QuerySpec) -> TrendsResult<EndpointRequest> {
    let spec = RequestSpec::new(Method::POST, Url::parse(EXPLORE_URL)?)
        .with_param("hl", locale.hl.as_str())
        .with_param("tz", locale.tz.to_string())
        .with_param("req", query.to_request_json()?);
    Ok(EndpointRequest::new(spec, EXPLORE_PREFIX_CHARS))
}

/// Data call unlocked by one widget token.
pub fn widget_request(
    url: &str,
    request: &Value,
    token: &str,
    locale: &Locale,
) -> TrendsResult<EndpointRequest> {
    let req = serde_json::to_string(request)
        .map_err(|err| TrendsError::MalformedResponse(err.to_string()))?;
    let spec = RequestSpec::get(Url::parse(url)?)
        .with_param("req", req)
        .with_param("token", token)
        .with_param("tz", locale.tz.to_string());
    Ok(EndpointRequest::new(spec, WIDGET_PREFIX_CHARS))
}

pub fn interest_over_time_request(
    widget: &Widget,
    locale: &Locale,
) -> TrendsResult<EndpointRequest> {
    widget_request(INTEREST_OVER_TIME_URL, &widget.request, &widget.token, locale)
}

pub fn multirange_interest_over_time_request(
    widget: &Widget,
    locale: &Locale,
) -> TrendsResult<EndpointRequest> {
    widget_request(MULTIRANGE_INTEREST_OVER_TIME_URL, &widget.request, &widget.token, locale)
}

pub fn interest_by_region_request(
    widget: &Widget,
    geo: &str,
    options: RegionOptions,
    locale: &Locale,
) -> TrendsResult<EndpointRequest> {
    let mut request = widget.request.clone();
    if let Value::Object(ref mut fields) = request {
        if options.resolution.applies_to(geo) {
            fields.insert(
                "resolution".into(),
                Value::String(options.resolution.as_param().into()),
            );
        }
        fields.insert(
            "includeLowSearchVolumeGeos".into(),
            Value::Bool(options.include_low_volume),
        );
    }
    widget_request(INTEREST_BY_REGION_URL, &request, &widget.token, locale)
}

pub fn related_searches_request(
    widget: &Widget,
    locale: &Locale,
) -> TrendsResult<EndpointRequest> {
    widget_request(RELATED_SEARCHES_URL, &widget.request, &widget.token, locale)
}

pub fn trending_searches_request() -> TrendsResult<EndpointRequest> {
    Ok(EndpointRequest::new(
        RequestSpec::get(Url::parse(TRENDING_SEARCHES_URL)?),
        0,
    ))
}

pub fn today_searches_request(pn: &str, locale: &Locale) -> TrendsResult<EndpointRequest> {
    let spec = RequestSpec::get(Url::parse(TODAY_SEARCHES_URL)?)
        .with_param("ns", "15")
        .with_param("geo", pn)
        .with_param("tz", locale.tz.to_string())
        .with_param("hl", locale.hl.as_str());
    Ok(EndpointRequest::new(spec, WIDGET_PREFIX_CHARS))
}

pub fn realtime_trending_searches_request(
    pn: &str,
    category: &str,
    count: u32,
    locale: &Locale,
) -> TrendsResult<EndpointRequest> {
    let spec = RequestSpec::get(Url::parse(REALTIME_TRENDING_SEARCHES_URL)?)
        .with_param("ns", "15")
        .with_param("geo", pn)
        .with_param("tz", locale.tz.to_string())
        .with_param("hl", locale.hl.as_str())
        .with_param("cat", category)
        .with_param("fi", "0")
        .with_param("fs", "0")
        .with_param("ri", count.min(MAX_REALTIME_RESULTS).to_string())
        .with_param("rs", realtime_story_count(count).to_string())
        .with_param("sort", "0");
    Ok(EndpointRequest::new(spec, WIDGET_PREFIX_CHARS))
}

/// Stories requested alongside `count` results.
fn realtime_story_count(count: u32) -> u32 {
    if count < REALTIME_STORY_LIMIT {
        count.saturating_sub(1)
    } else {
        REALTIME_STORY_LIMIT
    }
}

pub fn top_charts_request(year: i32, geo: &str, locale: &Locale) -> TrendsResult<EndpointRequest> {
    let spec = RequestSpec::get(Url::parse(TOP_CHARTS_URL)?)
        .with_param("hl", locale.hl.as_str())
        .with_param("tz", locale.tz.to_string())
        .with_param("date", year.to_string())
        .with_param("geo", geo)
        .with_param("isMobile", "false");
    Ok(EndpointRequest::new(spec, WIDGET_PREFIX_CHARS))
}

pub fn suggestions_request(keyword: &str, locale: &Locale) -> TrendsResult<EndpointRequest> {
    let mut url = Url::parse(SUGGESTIONS_URL)?;
    url.path_segments_mut()
        .map_err(|_| TrendsError::InvalidQuerySpec("suggestions url cannot take a path".into()))?
        .pop_if_empty()
        .push(keyword);
    let spec = RequestSpec::get(url).with_param("hl", locale.hl.as_str());
    Ok(EndpointRequest::new(spec, WIDGET_PREFIX_CHARS))
}

pub fn categories_request(locale: &Locale) -> TrendsResult<EndpointRequest> {
    let spec = RequestSpec::get(Url::parse(CATEGORIES_URL)?).with_param("hl", locale.hl.as_str());
    Ok(EndpointRequest::new(spec, WIDGET_PREFIX_CHARS))
}
