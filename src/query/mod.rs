//! Query specification for the explore endpoint.
//!
//! A [`QuerySpec`] is validated once, at construction, and is immutable
//! afterwards.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::error::{TrendsError, TrendsResult};

pub const MAX_KEYWORDS: usize = 5;
pub const MAX_KEYWORD_CHARS: usize = 100;
pub const DEFAULT_TIMEFRAME: &str = "today 5-y";

static RELATIVE_TIMEFRAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(all|now [1-9]\d*-[Hd]|today [1-9]\d*-[dmy])$")
        .expect("invalid timeframe regex")
});

/// Search property the interest is measured on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Property {
    #[default]
    Web,
    Images,
    News,
    YouTube,
    Shopping,
}

impl Property {
    /// Value of the `property` field sent to the provider.
    pub fn as_param(&self) -> &'static str {
        match self {
            Property::Web => "",
            Property::Images => "images",
            Property::News => "news",
            Property::YouTube => "youtube",
            Property::Shopping => "froogle",
        }
    }
}

impl FromStr for Property {
    type Err = TrendsError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "" | "web" => Ok(Property::Web),
            "images" => Ok(Property::Images),
            "news" => Ok(Property::News),
            "youtube" => Ok(Property::YouTube),
            "froogle" | "shopping" => Ok(Property::Shopping),
            other => Err(TrendsError::InvalidQuerySpec(format!(
                "property must be one of web, images, news, youtube, froogle; got {other:?}"
            ))),
        }
    }
}

/// Time window of a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Timeframe {
    /// Relative token such as `today 5-y`, `now 7-d` or `all`.
    Relative(String),
    /// Inclusive calendar range.
    Range { start: NaiveDate, end: NaiveDate },
}

impl Timeframe {
    pub fn relative(token: &str) -> TrendsResult<Self> {
        let token = token.trim();
        if RELATIVE_TIMEFRAME_RE.is_match(token) {
            Ok(Timeframe::Relative(token.to_string()))
        } else {
            Err(TrendsError::InvalidQuerySpec(format!(
                "unrecognised relative timeframe {token:?}"
            )))
        }
    }

    pub fn range(start: NaiveDate, end: NaiveDate) -> TrendsResult<Self> {
        if start > end {
            return Err(TrendsError::InvalidQuerySpec(format!(
                "timeframe starts after it ends ({start} > {end})"
            )));
        }
        Ok(Timeframe::Range { start, end })
    }
}

impl Default for Timeframe {
    fn default() -> Self {
        Timeframe::Relative(DEFAULT_TIMEFRAME.to_string())
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Timeframe::Relative(token) => f.write_str(token),
            Timeframe::Range { start, end } => {
                write!(f, "{} {}", start.format("%Y-%m-%d"), end.format("%Y-%m-%d"))
            }
        }
    }
}

impl FromStr for Timeframe {
    type Err = TrendsError;

    /// Accepts either a relative token or `YYYY-MM-DD YYYY-MM-DD`.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        if let Some((start, end)) = trimmed.split_once(' ')
            && let (Ok(start), Ok(end)) = (
                NaiveDate::parse_from_str(start, "%Y-%m-%d"),
                NaiveDate::parse_from_str(end.trim(), "%Y-%m-%d"),
            )
        {
            return Timeframe::range(start, end);
        }
        Timeframe::relative(trimmed)
    }
}

/// Validated, immutable query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuerySpec {
    keywords: Vec<String>,
    /// One entry per keyword.
    timeframes: Vec<Timeframe>,
    geo: String,
    category: u32,
    property: Property,
}

impl QuerySpec {
    pub fn builder<I, S>(keywords: I) -> QuerySpecBuilder
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        QuerySpecBuilder::new(keywords)
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    /// Timeframe of the first keyword.
    pub fn timeframe(&self) -> &Timeframe {
        &self.timeframes[0]
    }

    /// Timeframe of every keyword, in keyword order.
    pub fn timeframes(&self) -> &[Timeframe] {
        &self.timeframes
    }

    /// Whether keywords are compared over different timeframes, the input of
    /// multirange interest over time.
    pub fn is_multirange(&self) -> bool {
        self.timeframes.iter().any(|timeframe| timeframe != &self.timeframes[0])
    }

    pub fn geo(&self) -> &str {
        &self.geo
    }

    pub fn category(&self) -> u32 {
        self.category
    }

    pub fn property(&self) -> Property {
        self.property
    }

    /// JSON value of the explore `req` parameter.
    pub fn to_request_json(&self) -> TrendsResult<String> {
        let times: Vec<String> = self.timeframes.iter().map(Timeframe::to_string).collect();
        let payload = ExploreRequest {
            comparison_item: self
                .keywords
                .iter()
                .zip(&times)
                .map(|(keyword, time)| ComparisonItem {
                    keyword,
                    time,
                    geo: &self.geo,
                })
                .collect(),
            category: self.category,
            property: self.property.as_param(),
        };
        serde_json::to_string(&payload)
            .map_err(|err| TrendsError::InvalidQuerySpec(err.to_string()))
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ExploreRequest<'a> {
    comparison_item: Vec<ComparisonItem<'a>>,
    category: u32,
    property: &'a str,
}

#[derive(Serialize)]
struct ComparisonItem<'a> {
    keyword: &'a str,
    time: &'a str,
    geo: &'a str,
}

/// Builder collecting raw inputs; every check happens in [`build`](Self::build).
#[derive(Debug, Clone)]
pub struct QuerySpecBuilder {
    keywords: Vec<String>,
    timeframe: Result<Timeframe, String>,
    per_keyword: Option<Result<Vec<Timeframe>, String>>,
    geo: String,
    category: u32,
    property: Result<Property, String>,
}

impl QuerySpecBuilder {
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keywords: keywords.into_iter().map(Into::into).collect(),
            timeframe: Ok(Timeframe::default()),
            per_keyword: None,
            geo: String::new(),
            category: 0,
            property: Ok(Property::Web),
        }
    }

    /// One timeframe shared by every keyword.
    pub fn timeframe(mut self, timeframe: Timeframe) -> Self {
        self.timeframe = Ok(timeframe);
        self.per_keyword = None;
        self
    }

    /// Parse-later variant of [`timeframe`](Self::timeframe).
    pub fn timeframe_str(mut self, timeframe: &str) -> Self {
        self.timeframe = timeframe.parse().map_err(|err: TrendsError| err.to_string());
        self.per_keyword = None;
        self
    }

    /// One timeframe per keyword, in keyword order. The lengths must match.
    pub fn timeframes<I>(mut self, timeframes: I) -> Self
    where
        I: IntoIterator<Item = Timeframe>,
    {
        self.per_keyword = Some(Ok(timeframes.into_iter().collect()));
        self
    }

    /// Parse-later variant of [`timeframes`](Self::timeframes).
    pub fn timeframes_str<I, S>(mut self, timeframes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let parsed = timeframes
            .into_iter()
            .map(|raw| raw.as_ref().parse::<Timeframe>())
            .collect::<TrendsResult<Vec<_>>>()
            .map_err(|err| err.to_string());
        self.per_keyword = Some(parsed);
        self
    }

    pub fn geo(mut self, geo: impl Into<String>) -> Self {
        self.geo = geo.into();
        self
    }

    pub fn category(mut self, category: u32) -> Self {
        self.category = category;
        self
    }

    pub fn property(mut self, property: Property) -> Self {
        self.property = Ok(property);
        self
    }

    /// Parse-later variant of [`property`](Self::property).
    pub fn property_str(mut self, property: &str) -> Self {
        self.property = property.parse().map_err(|err: TrendsError| err.to_string());
        self
    }

    pub fn build(self) -> TrendsResult<QuerySpec> {
        if self.keywords.is_empty() || self.keywords.len() > MAX_KEYWORDS {
            return Err(TrendsError::InvalidQuerySpec(format!(
                "expected 1 to {MAX_KEYWORDS} keywords, got {}",
                self.keywords.len()
            )));
        }
        for keyword in &self.keywords {
            if keyword.trim().is_empty() {
                return Err(TrendsError::InvalidQuerySpec("keywords must not be blank".into()));
            }
            if keyword.chars().count() > MAX_KEYWORD_CHARS {
                return Err(TrendsError::InvalidQuerySpec(format!(
                    "keyword longer than {MAX_KEYWORD_CHARS} characters: {keyword:?}"
                )));
            }
        }

        let timeframes = match self.per_keyword {
            Some(parsed) => {
                let timeframes = parsed.map_err(TrendsError::InvalidQuerySpec)?;
                if timeframes.len() != self.keywords.len() {
                    return Err(TrendsError::InvalidQuerySpec(format!(
                        "expected one timeframe per keyword ({}), got {}",
                        self.keywords.len(),
                        timeframes.len()
                    )));
                }
                timeframes
            }
            None => {
                let timeframe = self.timeframe.map_err(TrendsError::InvalidQuerySpec)?;
                vec![timeframe; self.keywords.len()]
            }
        };
        let property = self.property.map_err(TrendsError::InvalidQuerySpec)?;

        Ok(QuerySpec {
            keywords: self.keywords,
            timeframes,
            geo: self.geo.trim().to_ascii_uppercase(),
            category: self.category,
            property,
        })
    }
}
