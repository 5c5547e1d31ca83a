//! Probing against a mock server: redirects, fallbacks, retries and robots

use crate::{create_test_config, html, redirect};
use std::time::Duration;
use url::Url;
use url_compare::config::Config;
use url_compare::probe::{
    title_hash, MetadataExtractor, PageMetadata, ProbeNote, Prober, RedirectHop,
};
use url_compare::{Discovery, FetchError, UrlSource};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config_for(server: &MockServer) -> Config {
    create_test_config(&server.uri(), "https://b.example.com")
}

fn prober(config: &Config) -> Prober {
    Prober::new(config).expect("Failed to build prober")
}

#[tokio::test]
async fn test_redirect_chain_with_metadata() {
    let server = MockServer::start().await;
    let base = server.uri();

    Mock::given(path("/old"))
        .respond_with(redirect(301, "/new"))
        .mount(&server)
        .await;

    Mock::given(path("/new"))
        .respond_with(html(
            r#"<html><head>
                <title>  New Page </title>
                <link rel="Canonical" href="/canonical">
            </head><body></body></html>"#,
        ))
        .mount(&server)
        .await;

    let result = prober(&config_for(&server))
        .probe_url(&format!("{}/old", base))
        .await;

    assert_eq!(result.initial_status, Some(301));
    assert_eq!(result.final_status, Some(200));
    assert_eq!(
        result.redirect_chain,
        vec![RedirectHop {
            status: 301,
            target: format!("{}/new", base),
        }]
    );
    assert_eq!(result.first_redirect_target, Some(format!("{}/new", base)));
    assert_eq!(result.final_url, Some(format!("{}/new", base)));
    assert_eq!(result.content_type.as_deref(), Some("text/html"));
    assert_eq!(result.title.as_deref(), Some("New Page"));
    assert_eq!(result.title_hash.as_ref().map(String::len), Some(12));
    assert_eq!(result.canonical_url, Some(format!("{}/canonical", base)));
    assert!(result.response_time_ms.is_some());
    assert!(result.error.is_none());
    assert!(result.notes.is_empty());
}

#[tokio::test]
async fn test_head_not_allowed_falls_back_to_get() {
    let server = MockServer::start().await;

    Mock::given(method("HEAD"))
        .and(path("/get-only"))
        .respond_with(ResponseTemplate::new(405))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/get-only"))
        .respond_with(html("<title>Only GET</title>"))
        .expect(1)
        .mount(&server)
        .await;

    let result = prober(&config_for(&server))
        .probe_url(&format!("{}/get-only", server.uri()))
        .await;

    assert_eq!(result.initial_status, Some(200));
    assert_eq!(result.final_status, Some(200));
    assert_eq!(result.title.as_deref(), Some("Only GET"));
    assert!(result.notes.is_empty());
}

#[tokio::test]
async fn test_redirect_loop_is_detected() {
    let server = MockServer::start().await;
    let base = server.uri();

    Mock::given(path("/loop-a"))
        .respond_with(redirect(302, "/loop-b"))
        .mount(&server)
        .await;

    Mock::given(path("/loop-b"))
        .respond_with(redirect(302, "/loop-a"))
        .mount(&server)
        .await;

    let result = prober(&config_for(&server))
        .probe_url(&format!("{}/loop-a", base))
        .await;

    assert_eq!(result.notes, vec![ProbeNote::RedirectLoop]);
    assert_eq!(result.redirect_hops(), 1);
    assert_eq!(result.initial_status, Some(302));
    assert_eq!(result.final_status, Some(302));
    assert_eq!(result.final_url, Some(format!("{}/loop-b", base)));
    assert!(matches!(result.error, Some(FetchError::RedirectLoop(_))));
}

#[tokio::test]
async fn test_max_redirects_exceeded() {
    let server = MockServer::start().await;
    let base = server.uri();

    for (from, to) in [("/r1", "/r2"), ("/r2", "/r3"), ("/r3", "/r4")] {
        Mock::given(path(from))
            .respond_with(redirect(301, to))
            .mount(&server)
            .await;
    }

    Mock::given(path("/r4"))
        .respond_with(html("<title>End</title>"))
        .expect(0)
        .mount(&server)
        .await;

    let mut config = config_for(&server);
    config.http.max_redirects = 2;

    let result = prober(&config).probe_url(&format!("{}/r1", base)).await;

    assert_eq!(result.notes, vec![ProbeNote::MaxRedirectsExceeded]);
    assert_eq!(result.redirect_hops(), 2);
    assert_eq!(result.final_status, Some(301));
    assert_eq!(result.final_url, Some(format!("{}/r3", base)));
    assert_eq!(result.first_redirect_target, Some(format!("{}/r2", base)));
    assert!(result.title.is_none());
}

#[tokio::test]
async fn test_redirect_without_location() {
    let server = MockServer::start().await;

    Mock::given(path("/nowhere"))
        .respond_with(ResponseTemplate::new(302))
        .mount(&server)
        .await;

    let result = prober(&config_for(&server))
        .probe_url(&format!("{}/nowhere", server.uri()))
        .await;

    assert_eq!(result.notes, vec![ProbeNote::RedirectMissingLocation]);
    assert_eq!(result.initial_status, Some(302));
    assert_eq!(result.final_status, Some(302));
    assert_eq!(result.redirect_hops(), 0);
    assert!(result.first_redirect_target.is_none());
}

#[tokio::test]
async fn test_transient_failures_are_retried() {
    let server = MockServer::start().await;

    Mock::given(path("/flaky"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .mount(&server)
        .await;

    Mock::given(path("/flaky"))
        .respond_with(html("<title>Recovered</title>"))
        .mount(&server)
        .await;

    let mut config = config_for(&server);
    config.http.retry = 2;

    let result = prober(&config)
        .probe_url(&format!("{}/flaky", server.uri()))
        .await;

    assert_eq!(result.initial_status, Some(200));
    assert_eq!(result.final_status, Some(200));
    assert_eq!(result.title.as_deref(), Some("Recovered"));
    assert!(result.error.is_none());
    assert!(result.notes.is_empty());
}

#[tokio::test]
async fn test_retries_exhausted_on_server_error() {
    let server = MockServer::start().await;

    Mock::given(path("/broken"))
        .respond_with(ResponseTemplate::new(500))
        .expect(2)
        .mount(&server)
        .await;

    let mut config = config_for(&server);
    config.http.retry = 1;

    let result = prober(&config)
        .probe_url(&format!("{}/broken", server.uri()))
        .await;

    assert_eq!(result.final_status, Some(500));
    assert_eq!(result.error, Some(FetchError::Status(500)));
    assert_eq!(result.notes, vec![ProbeNote::ServerError]);
}

#[tokio::test]
async fn test_too_many_requests_is_noted() {
    let server = MockServer::start().await;

    Mock::given(path("/busy"))
        .respond_with(ResponseTemplate::new(429))
        .expect(1)
        .mount(&server)
        .await;

    let result = prober(&config_for(&server))
        .probe_url(&format!("{}/busy", server.uri()))
        .await;

    assert_eq!(result.final_status, Some(429));
    assert_eq!(result.notes, vec![ProbeNote::RateLimited]);
}

#[tokio::test]
async fn test_client_errors_are_not_retried() {
    let server = MockServer::start().await;

    Mock::given(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = config_for(&server);
    config.http.retry = 3;

    let result = prober(&config)
        .probe_url(&format!("{}/missing", server.uri()))
        .await;

    assert_eq!(result.final_status, Some(404));
    assert!(result.error.is_none());
    assert!(result.notes.is_empty());
}

#[tokio::test]
async fn test_timeout_is_noted() {
    let server = MockServer::start().await;

    Mock::given(path("/slow"))
        .respond_with(html("<title>Slow</title>").set_delay(Duration::from_millis(1_500)))
        .mount(&server)
        .await;

    let mut config = config_for(&server);
    config.http.timeout_ms = 200;

    let result = prober(&config)
        .probe_url(&format!("{}/slow", server.uri()))
        .await;

    assert_eq!(result.initial_status, None);
    assert_eq!(result.error, Some(FetchError::Timeout));
    assert_eq!(result.notes, vec![ProbeNote::Timeout]);
}

#[tokio::test]
async fn test_robots_disallowed_url_is_never_requested() {
    let server = MockServer::start().await;

    Mock::given(path("/robots.txt"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string("User-agent: TestBot\nDisallow: /secret\n"),
        )
        .mount(&server)
        .await;

    Mock::given(path("/secret"))
        .respond_with(html("<title>Secret</title>"))
        .expect(0)
        .mount(&server)
        .await;

    let result = prober(&config_for(&server))
        .probe_url(&format!("{}/secret", server.uri()))
        .await;

    assert_eq!(result.notes, vec![ProbeNote::RobotsDisallowed]);
    assert_eq!(result.error, Some(FetchError::RobotsDisallowed));
    assert_eq!(result.initial_status, None);
    assert_eq!(result.final_url, None);
}

#[tokio::test]
async fn test_probe_keys_results_by_normalized_url() {
    let server = MockServer::start().await;
    let base = server.uri();

    Mock::given(path("/one"))
        .respond_with(html("<title>One</title>"))
        .mount(&server)
        .await;

    Mock::given(path("/two"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let config = config_for(&server);
    let options = config.normalize.options();
    let mut discovery = Discovery::new();
    discovery
        .insert(&format!("{}/one", base), UrlSource::Sitemap, &options)
        .unwrap();
    discovery
        .insert(&format!("{}/two?utm_source=x", base), UrlSource::Crawl, &options)
        .unwrap();

    let results = prober(&config).probe(&discovery).await;

    assert_eq!(results.len(), 2);
    for (key, discovered) in &discovery.urls {
        let result = results.get(key).expect("missing probe result");
        assert_eq!(result.url, discovered.url);
    }

    let two = discovery
        .urls
        .keys()
        .find(|key| key.path_key() == "/two")
        .unwrap();
    assert_eq!(results[two].final_status, Some(404));
}

#[tokio::test]
async fn test_canonicalising_redirects_are_not_loops() {
    let server = MockServer::start().await;
    let base = server.uri();

    Mock::given(path("/docs"))
        .respond_with(redirect(301, "/docs/"))
        .mount(&server)
        .await;
    Mock::given(path("/docs/"))
        .respond_with(html("<title>Docs</title>"))
        .mount(&server)
        .await;

    Mock::given(path("/a//b"))
        .respond_with(redirect(301, "/a/b"))
        .mount(&server)
        .await;
    Mock::given(path("/a/b"))
        .respond_with(html("<title>AB</title>"))
        .mount(&server)
        .await;

    Mock::given(path("/p"))
        .and(query_param("utm_source", "x"))
        .respond_with(redirect(301, "/p"))
        .mount(&server)
        .await;
    Mock::given(path("/p"))
        .respond_with(html("<title>P</title>"))
        .mount(&server)
        .await;

    let prober = prober(&config_for(&server));

    for (start, landing) in [("/docs", "/docs/"), ("/a//b", "/a/b"), ("/p?utm_source=x", "/p")] {
        let result = prober.probe_url(&format!("{}{}", base, start)).await;

        assert_eq!(result.initial_status, Some(301), "{}", start);
        assert_eq!(result.final_status, Some(200), "{}", start);
        assert_eq!(result.redirect_hops(), 1, "{}", start);
        assert_eq!(result.final_url, Some(format!("{}{}", base, landing)));
        assert!(result.notes.is_empty(), "{}: {:?}", start, result.notes);
        assert!(result.error.is_none());
    }
}

#[tokio::test]
async fn test_loop_through_trailing_slash_variant() {
    let server = MockServer::start().await;
    let base = server.uri();

    Mock::given(path("/x"))
        .respond_with(redirect(301, "/x/"))
        .mount(&server)
        .await;
    Mock::given(path("/x/"))
        .respond_with(redirect(301, "/x#top"))
        .mount(&server)
        .await;

    let result = prober(&config_for(&server))
        .probe_url(&format!("{}/x", base))
        .await;

    assert_eq!(result.notes, vec![ProbeNote::RedirectLoop]);
    assert_eq!(result.redirect_hops(), 1);
    assert_eq!(result.final_url, Some(format!("{}/x/", base)));
}

struct FixedTitle;

impl MetadataExtractor for FixedTitle {
    fn extract(&self, _html: &str, base_url: &Url) -> PageMetadata {
        PageMetadata {
            title: Some(format!("fixed:{}", base_url.path())),
            canonical_url: None,
        }
    }
}

#[tokio::test]
async fn test_custom_metadata_extractor() {
    let server = MockServer::start().await;

    Mock::given(path("/page"))
        .respond_with(html("<title>Ignored</title>"))
        .mount(&server)
        .await;

    let result = prober(&config_for(&server))
        .with_extractor(Box::new(FixedTitle))
        .probe_url(&format!("{}/page", server.uri()))
        .await;

    assert_eq!(result.title.as_deref(), Some("fixed:/page"));
    assert_eq!(result.title_hash, Some(title_hash("fixed:/page")));
    assert!(result.canonical_url.is_none());
}
