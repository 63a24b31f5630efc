mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{COOKIE_PATH, EXPLORE_PATH, MockTransport, Reply, cookies, json, route, status};
use http::Method;
use http::header::{ACCEPT_LANGUAGE, COOKIE};
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;
use trendscraper_rs::{
    ConfigError, RegionOptions, Resolution, TransportError, TrendsClient, TrendsError,
};

fn client(transport: Arc<MockTransport>) -> TrendsClient {
    TrendsClient::builder()
        .with_transport(transport)
        .disable_logging()
        .build()
        .unwrap()
}

fn data() -> Value {
    json!({"default": {"timelineData": [{"time": "1", "value": [42]}]}})
}

#[tokio::test]
async fn invalid_property_is_rejected_before_any_network_call() {
    let transport = MockTransport::new(|request, _, _| route(request, &data()).into());
    let client = client(transport.clone());

    let result = client.query(["pizza"]).property_str("blogs").build();
    assert!(matches!(result, Err(TrendsError::InvalidQuerySpec(_))));
    assert_eq!(transport.count(), 0);
}

#[tokio::test]
async fn too_many_keywords_are_rejected() {
    let transport = MockTransport::new(|request, _, _| route(request, &data()).into());
    let client = client(transport.clone());

    let result = client.query(["a", "b", "c", "d", "e", "f"]).build();
    assert!(matches!(result, Err(TrendsError::InvalidQuerySpec(_))));
    assert_eq!(transport.count(), 0);
}

#[tokio::test(start_paused = true)]
async fn concurrent_callers_share_one_session_fetch() {
    let transport =
        MockTransport::new(|_, _, _| Reply::After(Duration::from_millis(200), cookies()));
    let client = client(transport.clone());
    let other = client.clone();

    let (first, second) = tokio::join!(client.ensure_session(), other.ensure_session());
    let (first, second) = (first.unwrap(), second.unwrap());

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(transport.count(), 1);
    assert_eq!(first.get("NID"), Some("511=session"));
}

#[tokio::test]
async fn cookie_request_targets_locale_country() {
    let transport = MockTransport::new(|_, _, _| cookies().into());
    let client = TrendsClient::builder()
        .with_hl("de-DE")
        .with_transport(transport.clone())
        .disable_logging()
        .build()
        .unwrap();

    client.ensure_session().await.unwrap();
    let calls = transport.calls();
    assert_eq!(calls[0].url.path(), COOKIE_PATH);
    assert_eq!(calls[0].param("geo").as_deref(), Some("DE"));
    assert!(calls[0].headers.get(COOKIE).is_none());
    assert_eq!(calls[0].headers.get(ACCEPT_LANGUAGE).unwrap(), "de-DE");
}

#[tokio::test]
async fn session_without_cookies_fails_acquisition() {
    let transport = MockTransport::new(|request, _, _| {
        if request.url.path() == COOKIE_PATH {
            Reply::Now(Ok(common::response(200, "text/html", "<html></html>")))
        } else {
            route(request, &data()).into()
        }
    });
    let client = client(transport.clone());
    let query = client.query(["pizza"]).build().unwrap();

    assert!(matches!(
        client.negotiate(&query).await,
        Err(TrendsError::SessionAcquisitionFailed(_))
    ));
    assert_eq!(transport.count_path(EXPLORE_PATH), 0);
    assert!(client.session().await.is_none());
}

#[tokio::test]
async fn negotiation_sends_query_with_session_cookie() {
    let transport = MockTransport::new(|request, _, _| route(request, &data()).into());
    let client = client(transport.clone());
    let query = client
        .query(["pizza", "bagel"])
        .timeframe_str("today 3-m")
        .geo("us")
        .build()
        .unwrap();

    let tokens = client.negotiate(&query).await.unwrap();
    assert_eq!(tokens.time_series().unwrap().token, "ts-token");
    assert_eq!(tokens.region_map().unwrap().token, "geo-token");
    assert_eq!(tokens.related_queries().len(), 2);

    let explore = transport
        .calls()
        .into_iter()
        .find(|call| call.url.path() == EXPLORE_PATH)
        .unwrap();
    assert_eq!(explore.method, Method::POST);
    assert_eq!(explore.headers.get(COOKIE).unwrap(), "NID=511=session");
    assert_eq!(explore.param("hl").as_deref(), Some("en-US"));
    assert_eq!(explore.param("tz").as_deref(), Some("360"));

    let req: Value = serde_json::from_str(&explore.param("req").unwrap()).unwrap();
    assert_eq!(req["comparisonItem"][1]["keyword"], "bagel");
    assert_eq!(req["comparisonItem"][0]["time"], "today 3-m");
    assert_eq!(req["comparisonItem"][0]["geo"], "US");
}

#[tokio::test(start_paused = true)]
async fn negotiation_retries_transient_failures() {
    let transport = MockTransport::new(|request, _, index| {
        // index 0 is the cookie call, 1..=3 are failing explore attempts
        if request.url.path() == EXPLORE_PATH && index <= 3 {
            status(503).into()
        } else {
            route(request, &data()).into()
        }
    });
    let client = TrendsClient::builder()
        .with_retries(5)
        .with_backoff_factor(0.5)
        .with_transport(transport.clone())
        .disable_logging()
        .build()
        .unwrap();
    let query = client.query(["pizza"]).build().unwrap();

    client.negotiate(&query).await.unwrap();
    assert_eq!(transport.count_path(COOKIE_PATH), 1);
    assert_eq!(transport.count_path(EXPLORE_PATH), 4);
}

#[tokio::test]
async fn empty_widget_list_fails_negotiation() {
    let transport = MockTransport::new(|request, _, _| {
        if request.url.path() == EXPLORE_PATH {
            json(")]}'{\"widgets\": []}").into()
        } else {
            route(request, &data()).into()
        }
    });
    let client = client(transport.clone());
    let query = client.query(["pizza"]).build().unwrap();

    assert!(matches!(
        client.negotiate(&query).await,
        Err(TrendsError::TokenNegotiationFailed(_))
    ));
    assert_eq!(transport.count_path(EXPLORE_PATH), 1);
}

#[tokio::test]
async fn garbled_explore_body_fails_negotiation() {
    let transport = MockTransport::new(|request, _, _| {
        if request.url.path() == EXPLORE_PATH {
            json(")]}'not json").into()
        } else {
            route(request, &data()).into()
        }
    });
    let client = client(transport);
    let query = client.query(["pizza"]).build().unwrap();

    assert!(matches!(
        client.negotiate(&query).await,
        Err(TrendsError::TokenNegotiationFailed(_))
    ));
}

#[tokio::test]
async fn interest_over_time_uses_the_widget_token() {
    let transport = MockTransport::new(|request, _, _| route(request, &data()).into());
    let client = client(transport.clone());
    let query = client.query(["pizza"]).build().unwrap();
    let tokens = client.negotiate(&query).await.unwrap();

    let body = client.interest_over_time(&tokens).await.unwrap();
    assert_eq!(body, data());

    let call = transport.calls().pop().unwrap();
    assert_eq!(call.url.path(), "/trends/api/widgetdata/multiline");
    assert_eq!(call.param("token").as_deref(), Some("ts-token"));
    assert_eq!(call.param("tz").as_deref(), Some("360"));
    assert_eq!(call.headers.get(COOKIE).unwrap(), "NID=511=session");
    // session fetched once for both calls
    assert_eq!(transport.count_path(COOKIE_PATH), 1);
}

#[tokio::test]
async fn interest_by_region_applies_resolution() {
    let transport = MockTransport::new(|request, _, _| route(request, &data()).into());
    let client = client(transport.clone());
    let query = client.query(["pizza"]).build().unwrap();
    let tokens = client.negotiate(&query).await.unwrap();

    let options = RegionOptions {
        resolution: Resolution::Country,
        include_low_volume: true,
    };
    client.interest_by_region(&tokens, options).await.unwrap();

    let call = transport.calls().pop().unwrap();
    assert_eq!(call.url.path(), "/trends/api/widgetdata/comparedgeo");
    let req: Value = serde_json::from_str(&call.param("req").unwrap()).unwrap();
    assert_eq!(req["resolution"], "COUNTRY");
    assert_eq!(req["includeLowSearchVolumeGeos"], true);
}

#[tokio::test]
async fn related_queries_are_labelled_by_keyword() {
    let transport = MockTransport::new(|request, _, _| route(request, &data()).into());
    let client = client(transport.clone());
    let query = client.query(["pizza", "bagel"]).build().unwrap();
    let tokens = client.negotiate(&query).await.unwrap();

    let results = client.related_queries(&tokens).await.unwrap();
    let keywords: Vec<_> = results.iter().map(|result| result.keyword.as_str()).collect();
    assert_eq!(keywords, ["pizza", "bagel"]);
    assert_eq!(transport.count_path("/trends/api/widgetdata/relatedsearches"), 2);
}

#[tokio::test]
async fn trending_searches_pick_the_country() {
    let transport = MockTransport::new(|request, _, _| {
        if request.url.path() == COOKIE_PATH {
            cookies().into()
        } else {
            json(r#"{"united_states": ["pizza", "bagel"], "japan": ["ramen"]}"#).into()
        }
    });
    let client = client(transport);

    assert_eq!(client.trending_searches("japan").await.unwrap(), json!(["ramen"]));
    assert!(matches!(
        client.trending_searches("atlantis").await,
        Err(TrendsError::MalformedResponse(_))
    ));
}

#[tokio::test]
async fn suggestions_put_the_keyword_in_the_path() {
    let topics = json!({"default": {"topics": []}});
    let transport = MockTransport::new(move |request, _, _| route(request, &topics).into());
    let client = client(transport.clone());

    client.suggestions("pizza hut").await.unwrap();
    let call = transport.calls().pop().unwrap();
    assert_eq!(call.url.path(), "/trends/api/autocomplete/pizza%20hut");
    assert_eq!(call.param("hl").as_deref(), Some("en-US"));
}

#[tokio::test]
async fn proxies_cycle_across_session_and_data_calls() {
    let transport = MockTransport::new(|request, _, _| route(request, &data()).into());
    let client = TrendsClient::builder()
        .with_proxies(["http://p1:8080", "http://p2:8080", "http://p3:8080"])
        .with_transport(transport.clone())
        .disable_logging()
        .build()
        .unwrap();

    client.categories().await.unwrap();
    assert_eq!(
        transport.proxies(),
        vec![Some("http://p1:8080".to_string()), Some("http://p2:8080".to_string())]
    );
    assert_eq!(
        client.proxy_pool().current().unwrap().as_deref(),
        Some("http://p3:8080")
    );
}

#[tokio::test]
async fn reset_session_fetches_new_cookies() {
    let transport = MockTransport::new(|request, _, _| route(request, &data()).into());
    let client = client(transport.clone());

    let first = client.ensure_session().await.unwrap();
    client.reset_session().await;
    assert!(client.session().await.is_none());
    let second = client.ensure_session().await.unwrap();

    assert!(!Arc::ptr_eq(&first, &second));
    assert_eq!(transport.count_path(COOKIE_PATH), 2);
}

#[tokio::test]
async fn cancelled_handle_stops_before_sending() {
    let transport = MockTransport::new(|request, _, _| route(request, &data()).into());
    let client = client(transport.clone());
    let token = CancellationToken::new();
    let cancelled = client.with_cancellation(token.clone());
    token.cancel();

    let query = client.query(["pizza"]).build().unwrap();
    assert!(matches!(cancelled.negotiate(&query).await, Err(TrendsError::Cancelled)));
    assert_eq!(transport.count(), 0);

    // the original handle is unaffected
    client.negotiate(&query).await.unwrap();
}

#[tokio::test]
async fn exhausted_pool_surfaces_through_the_client() {
    let transport =
        MockTransport::new(|_, _, _| Reply::Now(Err(TransportError::Proxy("refused".into()))));
    let client = TrendsClient::builder()
        .with_proxies(["http://dead:8080"])
        .with_transport(transport.clone())
        .disable_logging()
        .build()
        .unwrap();

    assert!(matches!(client.categories().await, Err(TrendsError::ProxyExhausted)));
    assert!(matches!(client.categories().await, Err(TrendsError::ProxyExhausted)));
    assert_eq!(transport.count(), 1);
}

#[tokio::test]
async fn multirange_query_sends_one_timeframe_per_keyword() {
    let transport = MockTransport::new(|request, _, _| route(request, &data()).into());
    let client = client(transport.clone());
    let query = client
        .query(["pizza", "pizza"])
        .timeframes_str(["2022-09-04 2022-09-10", "2022-09-18 2022-09-24"])
        .build()
        .unwrap();
    let tokens = client.negotiate(&query).await.unwrap();

    let explore = transport
        .calls()
        .into_iter()
        .find(|call| call.url.path() == EXPLORE_PATH)
        .unwrap();
    let req: Value = serde_json::from_str(&explore.param("req").unwrap()).unwrap();
    assert_eq!(req["comparisonItem"][0]["time"], "2022-09-04 2022-09-10");
    assert_eq!(req["comparisonItem"][1]["time"], "2022-09-18 2022-09-24");

    assert_eq!(client.multirange_interest_over_time(&tokens).await.unwrap(), data());
    let call = transport.calls().pop().unwrap();
    assert_eq!(call.url.path(), "/trends/api/widgetdata/multirange");
    assert_eq!(call.param("token").as_deref(), Some("ts-token"));
}

#[test]
fn oversized_backoff_factor_is_a_config_error() {
    let result = TrendsClient::builder()
        .with_backoff_factor(1e30)
        .disable_logging()
        .build();
    assert!(matches!(
        result,
        Err(TrendsError::Config(ConfigError::Invalid { field: "backoff_factor", .. }))
    ));
}
