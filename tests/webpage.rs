use std::time::Duration;

use video_insights::extractors::webpage::FetchSettings;
use video_insights::extractors::{WebpageError, WebpageFetcher, WebpageSource};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ARTICLE: &str = r#"<html>
<head>
  <title>Sourdough | Bakery Blog</title>
  <meta property="og:title" content="Simple Sourdough">
  <meta name="author" content="Ada Baker">
  <meta property="og:site_name" content="Bakery Blog">
</head>
<body>
  <nav>Home | Recipes</nav>
  <article>
    <h1>Simple Sourdough</h1>
    <p>Mix flour, water and starter.</p>
    <script>trackPageView();</script>
    <p>Bake at 250C for 40 minutes.</p>
  </article>
</body>
</html>"#;

#[tokio::test]
async fn fetcher_extracts_article_with_browser_headers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/sourdough"))
        .and(header("DNT", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(ARTICLE, "text/html; charset=utf-8"))
        .expect(1)
        .mount(&server)
        .await;

    let url = format!("{}/sourdough", server.uri());
    let page = WebpageFetcher::default().fetch_article(&url).await.unwrap();

    assert_eq!(page.url, url);
    assert_eq!(page.metadata.title.as_deref(), Some("Simple Sourdough"));
    assert_eq!(page.metadata.byline.as_deref(), Some("Ada Baker"));
    assert_eq!(page.metadata.site_name.as_deref(), Some("Bakery Blog"));
    assert!(page.text_content.contains("Mix flour, water and starter."));
    assert!(page.text_content.contains("Bake at 250C"));
    assert!(!page.text_content.contains("trackPageView"));
    assert!(!page.text_content.contains("Home | Recipes"));
}

#[tokio::test]
async fn non_success_status_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let err = WebpageFetcher::default()
        .fetch_article(&format!("{}/missing", server.uri()))
        .await
        .unwrap_err();

    assert_eq!(err, WebpageError::HttpStatus(404));
    assert_eq!(err.to_string(), "HTTP error! status: 404");
}

#[tokio::test]
async fn non_html_content_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("{\"a\":1}", "application/json"))
        .mount(&server)
        .await;

    let err = WebpageFetcher::default()
        .fetch_article(&format!("{}/api", server.uri()))
        .await
        .unwrap_err();

    assert_eq!(err, WebpageError::UnexpectedContentType("application/json".to_string()));
}

#[tokio::test]
async fn slow_server_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(ARTICLE, "text/html")
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let fetcher = WebpageFetcher::new(FetchSettings {
        timeout: Duration::from_millis(200),
        ..Default::default()
    });
    let err = fetcher
        .fetch_article(&format!("{}/slow", server.uri()))
        .await
        .unwrap_err();

    assert_eq!(err, WebpageError::Timeout);
}
