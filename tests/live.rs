//! Smoke tests against the real provider. Run with `cargo test -- --ignored`.

use std::time::Duration;

use trendscraper_rs::{RegionOptions, TrendsClient};

fn client() -> TrendsClient {
    TrendsClient::builder()
        .with_retries(3)
        .with_backoff_factor(1.0)
        .with_timeout(Duration::from_secs(15))
        .build()
        .unwrap()
}

#[tokio::test]
#[ignore = "Requires network access"]
async fn explore_and_fetch_widgets() {
    let client = client();
    let query = client.query(["pizza", "bagel"]).timeframe_str("today 3-m").build().unwrap();
    let tokens = client.negotiate(&query).await.unwrap();

    let timeline = client.interest_over_time(&tokens).await.unwrap();
    assert!(timeline.pointer("/default/timelineData").is_some());

    let regions = client
        .interest_by_region(&tokens, RegionOptions::default())
        .await
        .unwrap();
    assert!(regions.pointer("/default/geoMapData").is_some());

    let related = client.related_queries(&tokens).await.unwrap();
    assert_eq!(related.len(), 2);
}

#[tokio::test]
#[ignore = "Requires network access"]
async fn keyword_suggestions() {
    let body = client().suggestions("pizza").await.unwrap();
    assert!(body.pointer("/default/topics").is_some());
}
