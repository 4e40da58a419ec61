//! Integration tests for recipes flowing from disk into page extraction.

use offline_reader::content::PageFetcher;
use offline_reader::extract::{ExtractionEngine, NO_TITLE};
use offline_reader::recipes::{ExtractionRecipe, RecipeStore, Strategy};
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const STORY_PAGE: &str = r#"<html><head><script>
var storyData = {"items": [{"headline": "Council votes", "html": "<p>The vote passed.</p><div class=\"promo\"><p>Subscribe</p></div>"}]};
</script></head><body><div id="app"></div></body></html>"#;

async fn serve(server: &MockServer, route: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(body.to_string(), "text/html; charset=utf-8"),
        )
        .mount(server)
        .await;
}

fn pages() -> PageFetcher {
    PageFetcher::new(reqwest::Client::new(), Duration::from_secs(5))
}

#[tokio::test]
async fn test_imported_js_recipe_extracts_served_page() {
    let dir = tempfile::tempdir().unwrap();
    let store = RecipeStore::new(dir.path());
    store.ensure_defaults().await.unwrap();
    store
        .import(
            r#"[{
                "domainPattern": "127\\.0\\.0\\.1",
                "strategy": "EXTRACT_FROM_JS_VAR",
                "targetIdentifier": "storyData",
                "contentPath": "items[0].html",
                "titlePath": "items[0].headline",
                "removeSelectors": [".promo"]
            }]"#,
        )
        .await
        .unwrap();

    let engine = ExtractionEngine::new(store.load_all().await.unwrap());
    assert_eq!(engine.len(), 2);

    let server = MockServer::start().await;
    serve(&server, "/story", STORY_PAGE).await;
    let html = pages()
        .fetch(&format!("{}/story", server.uri()), &engine, Some("https://cdn.test/a.jpg"))
        .await
        .unwrap();

    assert!(html.contains("<h1>Council votes</h1>"));
    assert!(html.contains("The vote passed."));
    assert!(!html.contains("Subscribe"));
    // injectRssImage defaults to off
    assert!(!html.contains("cdn.test"));
}

#[tokio::test]
async fn test_unmatched_page_is_kept_raw() {
    let defaults = ExtractionRecipe::defaults().into_iter().map(|(_, r)| r).collect();
    let engine = ExtractionEngine::new(defaults);
    let server = MockServer::start().await;
    serve(&server, "/plain", "<html><body><p>As served</p></body></html>").await;

    let html = pages()
        .fetch(&format!("{}/plain", server.uri()), &engine, None)
        .await
        .unwrap();

    assert_eq!(html, "<html><body><p>As served</p></body></html>");
}

#[tokio::test]
async fn test_matching_recipe_that_fails_keeps_raw_page() {
    let engine = ExtractionEngine::new(vec![ExtractionRecipe {
        domain_pattern: "127\\.0\\.0\\.1".to_string(),
        strategy: Strategy::CssSelector {
            content_selector: "main.article".to_string(),
            title_selector: None,
        },
        remove_selectors: Vec::new(),
        inject_rss_image: false,
        source_name: None,
    }]);
    let server = MockServer::start().await;
    serve(&server, "/other", "<html><body><p>No main here</p></body></html>").await;

    let html = pages()
        .fetch(&format!("{}/other", server.uri()), &engine, None)
        .await;

    assert_eq!(
        html.as_deref(),
        Some("<html><body><p>No main here</p></body></html>")
    );
}

#[tokio::test]
async fn test_css_recipe_without_title_uses_placeholder() {
    let engine = ExtractionEngine::new(vec![ExtractionRecipe {
        domain_pattern: "127\\.0\\.0\\.1".to_string(),
        strategy: Strategy::CssSelector {
            content_selector: "main".to_string(),
            title_selector: Some("h1.missing".to_string()),
        },
        remove_selectors: Vec::new(),
        inject_rss_image: true,
        source_name: Some("Local News".to_string()),
    }]);
    let server = MockServer::start().await;
    serve(&server, "/css", "<html><body><main><p>Story</p></main></body></html>").await;

    let html = pages()
        .fetch(
            &format!("{}/css", server.uri()),
            &engine,
            Some("file:///tmp/images/x.jpg"),
        )
        .await
        .unwrap();

    assert!(html.contains(&format!("<h1>{NO_TITLE}</h1>")));
    assert!(html.contains("<p class=\"byline\">Local News</p>"));
    assert!(html.contains("<img src=\"file:///tmp/images/x.jpg\""));
}
