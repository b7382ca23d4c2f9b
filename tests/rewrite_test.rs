use travel_ingest::rewrite::{ChatCompletionGenerator, MockGenerator, RewriteEngine};
use travel_ingest::types::{PipelineError, RewriteConfig, RewriteField};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_config(endpoint: String) -> RewriteConfig {
    RewriteConfig {
        endpoint,
        api_key: Some("test-key".to_string()),
        model: "test-model".to_string(),
        max_attempts: 3,
        retry_base_seconds: 0,
    }
}

fn engine_for(server: &MockServer) -> RewriteEngine {
    let config = test_config(format!("{}/api/v1/chat/completions", server.uri()));
    let generator = ChatCompletionGenerator::from_config(&config).unwrap();
    RewriteEngine::new(Box::new(generator), &config)
}

fn chat_body(content: &str) -> serde_json::Value {
    serde_json::json!({
        "id": "gen-1",
        "choices": [{ "index": 0, "message": { "role": "assistant", "content": content } }]
    })
}

#[tokio::test]
async fn json_response_parses_cleanly() {
    let server = MockServer::start().await;

    let model_output = serde_json::json!({
        "title": "Ten Quiet Coves Worth the Walk",
        "summary": "A shoreline walk past the crowds.",
        "content": "The path starts behind the fish market and climbs north.",
        "metaTitle": "Quiet Coves Guide",
        "metaDescription": "Where to find the quiet coves.",
        "keywords": ["coves", "hiking", "coast"],
        "country": "Greece",
        "category": "Adventure"
    })
    .to_string();

    Mock::given(method("POST"))
        .and(path("/api/v1/chat/completions"))
        .and(header("authorization", "Bearer test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_body(&model_output)))
        .mount(&server)
        .await;

    let engine = engine_for(&server);
    let outcome = engine
        .rewrite("raw article text", "Original Title")
        .await
        .unwrap();

    assert!(outcome.is_clean(), "defaulted: {:?}", outcome.defaulted);
    assert_eq!(outcome.result.title, "Ten Quiet Coves Worth the Walk");
    assert_eq!(outcome.result.country, "Greece");
    assert_eq!(outcome.result.category, "Adventure");
    assert_eq!(outcome.result.keywords.len(), 3);
}

#[tokio::test]
async fn delimited_sections_are_also_accepted() {
    let server = MockServer::start().await;

    let model_output = "###TITLE###\nHarborside Mornings\n\
        ###SUMMARY###\nBreakfast by the water.\n\
        ###CONTENT###\nThe cafes open before the ferries run.\n\
        ###KEYWORDS###\nharbor, breakfast\n\
        ###COUNTRY###\nPortugal\n\
        ###CATEGORY###\nFood & Wine\n";

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_body(model_output)))
        .mount(&server)
        .await;

    let engine = engine_for(&server);
    let outcome = engine.rewrite("raw text", "Original").await.unwrap();

    assert_eq!(outcome.result.title, "Harborside Mornings");
    assert_eq!(outcome.result.body, "The cafes open before the ferries run.");
    assert_eq!(outcome.result.keywords, vec!["harbor", "breakfast"]);
    assert_eq!(outcome.result.country, "Portugal");
    assert_eq!(outcome.result.category, "Food & Wine");
}

#[tokio::test]
async fn missing_fields_get_documented_defaults() {
    let server = MockServer::start().await;

    // Model returned only a body: every other field must be substituted
    // and none may end up empty.
    let model_output = serde_json::json!({ "content": "Just the rewritten prose. Nothing else." })
        .to_string();

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_body(&model_output)))
        .mount(&server)
        .await;

    let engine = engine_for(&server);
    let outcome = engine
        .rewrite("raw text", "Exploring Hidden Beaches")
        .await
        .unwrap();

    let result = &outcome.result;
    assert_eq!(result.title, "Exploring Hidden Beaches");
    assert_eq!(result.country, "Unknown");
    assert_eq!(result.category, "General");
    assert!(!result.summary.is_empty());
    assert!(!result.meta_title.is_empty());
    assert!(!result.meta_description.is_empty());
    assert!(!result.keywords.is_empty());

    assert!(outcome.defaulted.contains(&RewriteField::Title));
    assert!(outcome.defaulted.contains(&RewriteField::Country));
    assert!(outcome.defaulted.contains(&RewriteField::Category));
    assert!(!outcome.defaulted.contains(&RewriteField::Body));
}

#[tokio::test]
async fn provider_errors_stop_after_three_attempts() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&server)
        .await;

    let engine = engine_for(&server);
    let err = engine.rewrite("raw text", "Title").await.unwrap_err();

    match err {
        PipelineError::RewriteFailed { attempts, .. } => assert_eq!(attempts, 3),
        other => panic!("expected RewriteFailed, got {:?}", other),
    }
}

#[tokio::test]
async fn unstructured_responses_count_as_failures() {
    let server = MockServer::start().await;

    // Parseable HTTP response, but the model ignored the contract entirely.
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_body("sorry, I cannot do that")))
        .expect(3)
        .mount(&server)
        .await;

    let engine = engine_for(&server);
    let err = engine.rewrite("raw text", "Title").await.unwrap_err();

    assert!(matches!(err, PipelineError::RewriteFailed { attempts: 3, .. }));
}

#[tokio::test]
async fn transient_failures_recover_within_the_attempt_cap() {
    let config = RewriteConfig {
        max_attempts: 3,
        retry_base_seconds: 0,
        ..Default::default()
    };
    let generator = MockGenerator::new(
        serde_json::json!({
            "title": "Recovered",
            "summary": "s",
            "content": "c",
            "country": "Italy",
            "category": "Travel",
            "keywords": ["k"],
            "metaTitle": "m",
            "metaDescription": "d"
        })
        .to_string(),
    )
    .failing_first(2);

    let engine = RewriteEngine::new(Box::new(generator), &config);
    let outcome = engine.rewrite("raw", "orig").await.unwrap();

    assert_eq!(outcome.result.title, "Recovered");
    assert!(outcome.is_clean());
}

#[tokio::test]
async fn missing_api_key_is_a_config_error() {
    let config = RewriteConfig::default();
    let err = ChatCompletionGenerator::from_config(&config).unwrap_err();
    assert!(matches!(err, PipelineError::MissingConfig(_)));
}
