//! robots.txt caching across origins

use std::time::{Duration, Instant};
use url::Url;
use url_compare::robots::RobotsCache;
use wiremock::matchers::path;
use wiremock::{Mock, MockServer, ResponseTemplate};

fn cache() -> RobotsCache {
    RobotsCache::new(reqwest::Client::new(), "TestBot/1.0")
}

#[tokio::test]
async fn test_fetched_once_per_origin() {
    let server = MockServer::start().await;

    Mock::given(path("/robots.txt"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("User-agent: *\nDisallow: /private\n")
                .set_delay(Duration::from_millis(100)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let cache = cache();
    let open = Url::parse(&format!("{}/open", server.uri())).unwrap();
    let private = Url::parse(&format!("{}/private/x", server.uri())).unwrap();

    let results = futures::future::join_all(
        (0..5).map(|i| cache.is_allowed(if i % 2 == 0 { &open } else { &private })),
    )
    .await;

    assert_eq!(results, vec![true, false, true, false, true]);
}

#[tokio::test]
async fn test_slow_origin_does_not_block_others() {
    let slow = MockServer::start().await;
    let fast = MockServer::start().await;

    Mock::given(path("/robots.txt"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("User-agent: *\nDisallow:\n")
                .set_delay(Duration::from_millis(1_500)),
        )
        .mount(&slow)
        .await;

    Mock::given(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /\n"))
        .mount(&fast)
        .await;

    let cache = cache();
    let slow_url = Url::parse(&format!("{}/page", slow.uri())).unwrap();
    let fast_url = Url::parse(&format!("{}/page", fast.uri())).unwrap();

    let fast_check = async {
        let start = Instant::now();
        let allowed = cache.is_allowed(&fast_url).await;
        (allowed, start.elapsed())
    };

    let (slow_allowed, (fast_allowed, fast_elapsed)) =
        tokio::join!(cache.is_allowed(&slow_url), fast_check);

    assert!(slow_allowed);
    assert!(!fast_allowed);
    assert!(
        fast_elapsed < Duration::from_millis(1_000),
        "fast origin waited {:?}",
        fast_elapsed
    );
}
