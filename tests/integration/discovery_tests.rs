//! Discovery against mock sites: sitemap traversal and crawling

use crate::{create_test_config, html, redirect, sitemap_index, urlset};
use flate2::write::GzEncoder;
use flate2::Compression;
use std::collections::BTreeSet;
use std::io::Write;
use url::Url;
use url_compare::discovery::{Discoverer, Discovery, DiscoveryMode, UrlSource};
use url_compare::FetchError;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn paths(discovery: &Discovery) -> BTreeSet<String> {
    discovery
        .urls
        .keys()
        .map(|normalized| normalized.path_key())
        .collect()
}

fn source_of(discovery: &Discovery, path_key: &str) -> Option<UrlSource> {
    discovery
        .urls
        .values()
        .find(|url| url.normalized.path_key() == path_key)
        .map(|url| url.source)
}

async fn discover(server: &MockServer, mode: DiscoveryMode, max_depth: u32) -> Discovery {
    let mut config = create_test_config(&server.uri(), "https://b.example.com");
    config.discovery.crawl_max_depth = max_depth;
    let discoverer = Discoverer::new(&config).expect("Failed to build discoverer");
    let root = Url::parse(&server.uri()).unwrap();
    discoverer.discover(&root, mode).await
}

#[tokio::test]
async fn test_sitemap_index_with_gzip_child_and_cycle() {
    let server = MockServer::start().await;
    let base = server.uri();

    let gz_body = format!(
        "<urlset><url><loc>{}/c</loc></url></urlset>",
        base
    );
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(gz_body.as_bytes()).unwrap();
    let compressed = encoder.finish().unwrap();

    Mock::given(path("/sitemap.xml"))
        .respond_with(sitemap_index(&[
            format!("{}/pages.xml", base),
            format!("{}/posts.xml.gz", base),
            format!("{}/sitemap.xml", base),
        ]))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(path("/pages.xml"))
        .respond_with(urlset(&[
            format!("{}/a", base),
            format!("{}/b/", base),
            format!("{}/a", base),
            "https://elsewhere.example.com/x".to_string(),
        ]))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(path("/posts.xml.gz"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(compressed, "application/octet-stream"),
        )
        .mount(&server)
        .await;

    let discovery = discover(&server, DiscoveryMode::Sitemap, 2).await;

    let expected: BTreeSet<String> = ["/a", "/b", "/c"].iter().map(|s| s.to_string()).collect();
    assert_eq!(paths(&discovery), expected);
    assert!(discovery.issues.is_empty(), "issues: {:?}", discovery.issues);
    assert_eq!(source_of(&discovery, "/a"), Some(UrlSource::Sitemap));
}

#[tokio::test]
async fn test_robots_sitemap_directive_and_failed_nodes() {
    let server = MockServer::start().await;
    let base = server.uri();

    Mock::given(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string(format!(
            "User-agent: *\nDisallow:\nSitemap: {}/extra-index.xml\n",
            base
        )))
        .mount(&server)
        .await;

    // /sitemap.xml is not mounted and returns 404

    Mock::given(path("/extra-index.xml"))
        .respond_with(sitemap_index(&[
            format!("{}/good.xml", base),
            format!("{}/broken.xml", base),
        ]))
        .mount(&server)
        .await;

    Mock::given(path("/good.xml"))
        .respond_with(urlset(&[format!("{}/d", base)]))
        .mount(&server)
        .await;

    Mock::given(path("/broken.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            format!("<urlset><url><loc>{}/partial</loc></url>", base),
            "application/xml",
        ))
        .mount(&server)
        .await;

    let discovery = discover(&server, DiscoveryMode::Sitemap, 2).await;

    let expected: BTreeSet<String> = ["/d"].iter().map(|s| s.to_string()).collect();
    assert_eq!(paths(&discovery), expected);

    assert_eq!(discovery.issues.len(), 2);
    let not_found = discovery
        .issues
        .iter()
        .find(|issue| issue.url.ends_with("/sitemap.xml"))
        .expect("missing issue for /sitemap.xml");
    assert_eq!(not_found.error, FetchError::Status(404));

    let broken = discovery
        .issues
        .iter()
        .find(|issue| issue.url.ends_with("/broken.xml"))
        .expect("missing issue for /broken.xml");
    assert!(matches!(broken.error, FetchError::Parse(_)));
}

#[tokio::test]
async fn test_sitemap_override_list() {
    let server = MockServer::start().await;
    let base = server.uri();

    Mock::given(path("/custom.xml"))
        .respond_with(urlset(&[format!("{}/only", base)]))
        .mount(&server)
        .await;

    Mock::given(path("/sitemap.xml"))
        .respond_with(urlset(&[format!("{}/default", base)]))
        .expect(0)
        .mount(&server)
        .await;

    let mut config = create_test_config(&base, "https://b.example.com");
    config.discovery.sitemaps = vec![
        format!("{}/custom.xml", base),
        "https://b.example.com/sitemap.xml".to_string(),
    ];
    let discoverer = Discoverer::new(&config).unwrap();
    let discovery = discoverer
        .discover(&Url::parse(&base).unwrap(), DiscoveryMode::Sitemap)
        .await;

    let expected: BTreeSet<String> = ["/only"].iter().map(|s| s.to_string()).collect();
    assert_eq!(paths(&discovery), expected);
    assert!(discovery.issues.is_empty());
}

#[tokio::test]
async fn test_crawl_respects_depth_robots_nofollow_and_extensions() {
    let server = MockServer::start().await;
    let base = server.uri();

    Mock::given(path("/robots.txt"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /private\n"),
        )
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(&format!(
            r#"<html><body>
                <a href="/a">A</a>
                <a href="/b" rel="nofollow">B</a>
                <a href="/files/report.pdf">Report</a>
                <a href="/private/area">Private</a>
                <a href="https://elsewhere.example.com/x">External</a>
                <a href="{}/a#top">A again</a>
            </body></html>"#,
            base
        )))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/a"))
        .respond_with(html(r#"<html><body><a href="/a/deep">Deep</a></body></html>"#))
        .expect(1)
        .mount(&server)
        .await;

    // Depth 2 is the limit: recorded, never fetched
    Mock::given(method("GET"))
        .and(path("/a/deep"))
        .respond_with(html(r#"<html><body><a href="/a/deeper">Deeper</a></body></html>"#))
        .expect(0)
        .mount(&server)
        .await;

    // nofollow: recorded, never fetched
    Mock::given(method("GET"))
        .and(path("/b"))
        .respond_with(html(r#"<html><body><a href="/from-b">x</a></body></html>"#))
        .expect(0)
        .mount(&server)
        .await;

    Mock::given(path("/private/area"))
        .respond_with(html("<html></html>"))
        .expect(0)
        .mount(&server)
        .await;

    let mut config = create_test_config(&base, "https://b.example.com");
    config.discovery.crawl_max_depth = 2;
    config.discovery.exclude_extensions = vec![".pdf".to_string()];
    let discoverer = Discoverer::new(&config).unwrap();
    let discovery = discoverer
        .discover(&Url::parse(&base).unwrap(), DiscoveryMode::Crawl)
        .await;

    let expected: BTreeSet<String> = ["/", "/a", "/a/deep", "/b"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    assert_eq!(paths(&discovery), expected);
    assert_eq!(source_of(&discovery, "/a"), Some(UrlSource::Crawl));
    assert!(discovery.issues.is_empty());
}

#[tokio::test]
async fn test_crawl_ignores_robots_when_disabled() {
    let server = MockServer::start().await;
    let base = server.uri();

    Mock::given(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /\n"))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(r#"<a href="/inside">in</a>"#))
        .mount(&server)
        .await;

    let mut config = create_test_config(&base, "https://b.example.com");
    config.discovery.crawl_max_depth = 1;
    config.http.follow_robots = false;
    let discoverer = Discoverer::new(&config).unwrap();
    let discovery = discoverer
        .discover(&Url::parse(&base).unwrap(), DiscoveryMode::Crawl)
        .await;

    let expected: BTreeSet<String> = ["/", "/inside"].iter().map(|s| s.to_string()).collect();
    assert_eq!(paths(&discovery), expected);

    config.http.follow_robots = true;
    let discoverer = Discoverer::new(&config).unwrap();
    let discovery = discoverer
        .discover(&Url::parse(&base).unwrap(), DiscoveryMode::Crawl)
        .await;
    assert!(discovery.is_empty());
}

#[tokio::test]
async fn test_sitemap_and_crawl_merge_into_both() {
    let server = MockServer::start().await;
    let base = server.uri();

    Mock::given(path("/sitemap.xml"))
        .respond_with(urlset(&[
            format!("{}/page", base),
            format!("{}/page/", base),
            format!("{}/sitemap-only", base),
        ]))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(r#"<a href="/page">Page</a>"#))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/page"))
        .respond_with(html("<title>Page</title>"))
        .mount(&server)
        .await;

    let discovery = discover(&server, DiscoveryMode::Both, 2).await;

    assert_eq!(discovery.len(), 3);
    assert_eq!(source_of(&discovery, "/page"), Some(UrlSource::Both));
    assert_eq!(source_of(&discovery, "/sitemap-only"), Some(UrlSource::Sitemap));
    assert_eq!(source_of(&discovery, "/"), Some(UrlSource::Crawl));
}

#[tokio::test]
async fn test_crawl_follows_redirected_homepage() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(redirect(302, "/home"))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/home"))
        .respond_with(html(r#"<a href="about">About</a>"#))
        .mount(&server)
        .await;

    let discovery = discover(&server, DiscoveryMode::Crawl, 1).await;

    let expected: BTreeSet<String> = ["/", "/about"].iter().map(|s| s.to_string()).collect();
    assert_eq!(paths(&discovery), expected);
}

#[tokio::test]
async fn test_followed_link_overrides_earlier_nofollow() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(
            r#"<a href="/a" rel="nofollow">A</a> <a href="/a">A again</a>"#,
        ))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/a"))
        .respond_with(html(r#"<a href="/deep">Deep</a>"#))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/deep"))
        .respond_with(html("<title>Deep</title>"))
        .mount(&server)
        .await;

    let discovery = discover(&server, DiscoveryMode::Crawl, 3).await;

    let expected: BTreeSet<String> = ["/", "/a", "/deep"].iter().map(|s| s.to_string()).collect();
    assert_eq!(paths(&discovery), expected);
}

#[tokio::test]
async fn test_followed_link_on_another_page_reaches_nofollow_target() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(
            r#"<a href="/a" rel="nofollow">A</a> <a href="/b">B</a>"#,
        ))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/b"))
        .respond_with(html(r#"<a href="/a">A</a>"#))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/a"))
        .respond_with(html(r#"<a href="/from-a">From A</a>"#))
        .expect(1)
        .mount(&server)
        .await;

    let discovery = discover(&server, DiscoveryMode::Crawl, 3).await;

    let expected: BTreeSet<String> = ["/", "/a", "/b", "/from-a"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    assert_eq!(paths(&discovery), expected);
}
