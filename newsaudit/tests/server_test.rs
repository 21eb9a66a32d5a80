use std::sync::Arc;
use std::time::Duration;

use rocket::http::{ContentType, Status};
use rocket::local::asynchronous::Client;
use serde_json::Value;
use tempfile::TempDir;

use newsaudit::analyzer::Analyzer;
use newsaudit::extraction::{ExtractionClient, ExtractionConfig, RetryPolicy};
use newsaudit::fetcher::NewsSource;
use newsaudit::llm::scripted::ScriptedProvider;
use newsaudit::model::{RawArticle, SentimentPolicy};
use newsaudit::normalizer::Normalizer;
use newsaudit::pipeline::Pipeline;
use newsaudit::report::{ReportStore, RAW_ARTICLES_FILE, REPORT_FILE, RESULTS_FILE};
use newsaudit::server::{build_rocket, AppState};
use newsaudit::service::AnalysisService;
use newsaudit::validator::Validator;

/// In-memory news source returning a fixed list
struct StaticNews(Vec<RawArticle>);

#[async_trait::async_trait]
impl NewsSource for StaticNews {
    async fn fetch(&self, _query: &str, page_size: u32) -> anyhow::Result<Vec<RawArticle>> {
        Ok(self.0.iter().take(page_size as usize).cloned().collect())
    }
}

struct DownNews;

#[async_trait::async_trait]
impl NewsSource for DownNews {
    async fn fetch(&self, _query: &str, _page_size: u32) -> anyhow::Result<Vec<RawArticle>> {
        anyhow::bail!("invalid news API key (401)")
    }
}

fn raw(title: &str) -> RawArticle {
    RawArticle {
        title: title.to_string(),
        description: format!("{} was announced by officials on Tuesday.", title),
        body: "Officials said the measure would take effect next month after cabinet approval. [+900 chars]"
            .to_string(),
        url: "https://example.com/story".to_string(),
        source: "Example Wire".to_string(),
        author: None,
        published_at: Some("2026-10-18T08:00:00Z".to_string()),
    }
}

fn client_for(provider: Arc<ScriptedProvider>) -> ExtractionClient {
    ExtractionClient::new(
        provider,
        ExtractionConfig {
            retry: RetryPolicy {
                max_attempts: 2,
                base_delay: Duration::ZERO,
            },
            ..Default::default()
        },
    )
}

fn service(news: Arc<dyn NewsSource>, dir: &TempDir) -> AnalysisService {
    let analyzer = Arc::new(ScriptedProvider::new("analyzer-model").with_fallback(Ok(
        r#"{"gist": "A new measure was announced.", "sentiment": "Positive", "tone": "informative"}"#.to_string(),
    )));
    let validator = Arc::new(
        ScriptedProvider::new("validator-model")
            .with_fallback(Ok(r#"{"is_accurate": true, "notes": "Matches the article."}"#.to_string())),
    );
    let pipeline = Pipeline::new(
        Analyzer::new(client_for(analyzer), SentimentPolicy::CoerceNeutral),
        Validator::new(client_for(validator)),
        Duration::ZERO,
    );
    AnalysisService::new(
        news,
        Normalizer::new(50),
        pipeline,
        ReportStore::new(dir.path()),
        "India politics",
        15,
    )
}

async fn local_client(service: AnalysisService) -> Client {
    let figment = rocket::Config::figment().merge(("log_level", "off"));
    Client::tracked(build_rocket(AppState::new(Arc::new(service)), figment))
        .await
        .expect("valid rocket instance")
}

#[tokio::test]
async fn health_and_status() {
    let dir = tempfile::tempdir().unwrap();
    let client = local_client(service(Arc::new(StaticNews(vec![])), &dir)).await;

    let response = client.get("/health").dispatch().await;
    assert_eq!(response.status(), Status::Ok);
    assert_eq!(response.into_string().await.as_deref(), Some("OK"));

    let response = client.get("/").dispatch().await;
    assert_eq!(response.status(), Status::Ok);
    let body: Value = response.into_json().await.unwrap();
    assert_eq!(body["status"], "running");
    assert_eq!(body["run_in_progress"], false);
    assert!(body["last_run"].is_null());
}

#[tokio::test]
async fn report_and_results_are_404_before_any_run() {
    let dir = tempfile::tempdir().unwrap();
    let client = local_client(service(Arc::new(StaticNews(vec![])), &dir)).await;

    let response = client.get("/report").dispatch().await;
    assert_eq!(response.status(), Status::NotFound);
    let body: Value = response.into_json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("/analyze"));

    let response = client.get("/results").dispatch().await;
    assert_eq!(response.status(), Status::NotFound);
}

#[tokio::test]
async fn analyze_writes_artifacts_and_serves_them() {
    let dir = tempfile::tempdir().unwrap();
    let news = StaticNews(vec![raw("New metro line"), raw("Farm subsidy"), raw("Port expansion")]);
    let client = local_client(service(Arc::new(news), &dir)).await;

    let response = client
        .post("/analyze")
        .header(ContentType::JSON)
        .body(r#"{"query": "infrastructure", "num_articles": 2}"#)
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);
    let body: Value = response.into_json().await.unwrap();
    assert_eq!(body["status"], "success");
    assert_eq!(body["summary"]["total"], 2);
    assert_eq!(body["summary"]["ok"], 2);
    assert_eq!(body["summary"]["validated"], 2);
    assert_eq!(body["summary"]["sentiment"]["positive"], 2);

    for file in [RAW_ARTICLES_FILE, RESULTS_FILE, REPORT_FILE] {
        assert!(dir.path().join(file).exists(), "{} missing", file);
    }

    let response = client.get("/report").dispatch().await;
    assert_eq!(response.status(), Status::Ok);
    assert_eq!(response.content_type(), Some(ContentType::new("text", "markdown")));
    let markdown = response.into_string().await.unwrap();
    assert!(markdown.contains("# News Analysis Report"));
    assert!(markdown.contains("New metro line"));
    assert!(markdown.contains("infrastructure"));

    let response = client.get("/results").dispatch().await;
    assert_eq!(response.status(), Status::Ok);
    let results: Value = response.into_json().await.unwrap();
    let records = results.as_array().unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0]["status"], "ok");
    assert_eq!(records[0]["analysis"]["sentiment"], "positive");

    let status: Value = client.get("/").dispatch().await.into_json().await.unwrap();
    assert_eq!(status["last_run"]["summary"]["total"], 2);
}

#[tokio::test]
async fn analyze_against_mocked_news_api() {
    let mut news_server = mockito::Server::new_async().await;
    let mock = news_server
        .mock("GET", "/v2/everything")
        .match_header("x-api-key", "test-news-key")
        .match_query(mockito::Matcher::UrlEncoded("q".into(), "elections".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{
                "status": "ok",
                "totalResults": 2,
                "articles": [
                    {
                        "source": {"id": null, "name": "Example Wire"},
                        "title": "Election commission announces dates",
                        "description": "Polling will be held in five phases across the state.",
                        "url": "https://example.com/dates",
                        "publishedAt": "2026-10-18T08:00:00Z",
                        "content": "<p>The commission said counting would follow a week later.</p> [+1500 chars]"
                    },
                    {
                        "source": {"id": null, "name": "Example Wire"},
                        "title": "Too short",
                        "description": "Brief.",
                        "url": "https://example.com/short",
                        "content": null
                    }
                ]
            }"#,
        )
        .create_async()
        .await;

    let settings = common::NewsSettings {
        api_url: format!("{}/v2/everything", news_server.url()),
        api_key: "test-news-key".to_string(),
        query: "elections".to_string(),
        page_size: 10,
        language: "en".to_string(),
        sort_by: "publishedAt".to_string(),
        timeout: Duration::from_secs(5),
        max_attempts: 1,
        retry_base_delay: Duration::ZERO,
        min_text_chars: 50,
    };
    let news = newsaudit::fetcher::NewsClient::new(&settings).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let client = local_client(service(Arc::new(news), &dir)).await;

    let response = client
        .post("/analyze")
        .header(ContentType::JSON)
        .body(r#"{"query": "elections"}"#)
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);
    let body: Value = response.into_json().await.unwrap();
    // The short record is fetched but dropped by the normalizer
    assert_eq!(body["summary"]["total"], 1);
    assert_eq!(body["summary"]["ok"], 1);

    let results: Value = client.get("/results").dispatch().await.into_json().await.unwrap();
    let text = results[0]["article"]["text"].as_str().unwrap();
    assert!(!text.contains("<p>"));
    assert!(!text.contains("[+1500 chars]"));

    mock.assert_async().await;
}

#[tokio::test]
async fn analyze_without_body_uses_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let client = local_client(service(Arc::new(StaticNews(vec![raw("Metro")])), &dir)).await;

    let response = client.post("/analyze").dispatch().await;
    assert_eq!(response.status(), Status::Ok);

    let response = client.post("/analyze").header(ContentType::JSON).body("").dispatch().await;
    assert_eq!(response.status(), Status::Ok);

    let markdown = client.get("/report").dispatch().await.into_string().await.unwrap();
    assert!(markdown.contains("**Query:** India politics"));
}

#[tokio::test]
async fn empty_search_is_unprocessable() {
    let dir = tempfile::tempdir().unwrap();
    let client = local_client(service(Arc::new(StaticNews(vec![])), &dir)).await;

    let response = client.post("/analyze").dispatch().await;
    assert_eq!(response.status(), Status::UnprocessableEntity);
    let body: Value = response.into_json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("India politics"));
    assert!(!dir.path().join(REPORT_FILE).exists());
}

#[tokio::test]
async fn news_outage_is_bad_gateway() {
    let dir = tempfile::tempdir().unwrap();
    let client = local_client(service(Arc::new(DownNews), &dir)).await;

    let response = client.post("/analyze").dispatch().await;
    assert_eq!(response.status(), Status::BadGateway);
    let body: Value = response.into_json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("401"));
}

#[tokio::test]
async fn concurrent_run_is_rejected_and_last_run_stays_visible() {
    let dir = tempfile::tempdir().unwrap();
    let client = local_client(service(Arc::new(StaticNews(vec![raw("Metro")])), &dir)).await;

    let response = client.post("/analyze").dispatch().await;
    assert_eq!(response.status(), Status::Ok);
    let first: Value = response.into_json().await.unwrap();

    let state = client.rocket().state::<AppState>().unwrap();
    let _running = state.run_guard.lock().await;

    let response = client.post("/analyze").dispatch().await;
    assert_eq!(response.status(), Status::Conflict);

    let status: Value = client.get("/").dispatch().await.into_json().await.unwrap();
    assert_eq!(status["run_in_progress"], true);
    assert_eq!(status["last_run"]["run_id"], first["run_id"]);
    assert_eq!(status["last_run"]["summary"]["total"], 1);
}

#[tokio::test]
async fn malformed_body_is_rejected_instead_of_defaulted() {
    let dir = tempfile::tempdir().unwrap();
    let client = local_client(service(Arc::new(StaticNews(vec![raw("Metro")])), &dir)).await;

    let response = client
        .post("/analyze")
        .header(ContentType::JSON)
        .body(r#"{"query": "elections", "num_articles": "ten"}"#)
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::UnprocessableEntity);
    let body: Value = response.into_json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("Invalid request body"));

    let response = client
        .post("/analyze")
        .header(ContentType::JSON)
        .body("{not json")
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::UnprocessableEntity);

    // No run happened
    assert!(!dir.path().join(RAW_ARTICLES_FILE).exists());
    let status: Value = client.get("/").dispatch().await.into_json().await.unwrap();
    assert!(status["last_run"].is_null());
}

#[tokio::test]
async fn no_usable_articles_leaves_previous_artifacts_alone() {
    let dir = tempfile::tempdir().unwrap();
    let mut short = raw("Tiny");
    short.description = "Brief.".to_string();
    short.body = String::new();
    let client = local_client(service(Arc::new(StaticNews(vec![short])), &dir)).await;

    let response = client.post("/analyze").dispatch().await;
    assert_eq!(response.status(), Status::UnprocessableEntity);
    let body: Value = response.into_json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("usable text"));

    for file in [RAW_ARTICLES_FILE, RESULTS_FILE, REPORT_FILE] {
        assert!(!dir.path().join(file).exists(), "{} should not be written", file);
    }
}
