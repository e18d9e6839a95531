use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use moodring_journal::{InfluenceRepository, MemoryStore};
use moodring_reflection::{CompletionError, CompletionService, ReflectionEngine, WEEKLY_EMPTY_MESSAGE};
use moodring_schemas::{Influence, InfluenceGraph, InfluenceLink, Reflection, TimelineEntry};
use moodring_service::{router, AppState};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

/// Replies with a canned reflection and remembers the prompts it saw
#[derive(Default)]
struct CannedCompletion {
    prompts: Mutex<Vec<String>>,
}

#[async_trait]
impl CompletionService for CannedCompletion {
    async fn complete(&self, prompt: &str) -> Result<String, CompletionError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        Ok("You keep returning to rest and attention.".to_string())
    }

    fn name(&self) -> &'static str {
        "canned"
    }
}

fn test_app() -> (Router, Arc<CannedCompletion>) {
    let completion = Arc::new(CannedCompletion::default());
    let repository = InfluenceRepository::new(Arc::new(MemoryStore::new()));
    let engine = ReflectionEngine::new(repository.clone(), completion.clone());
    (router(AppState::new(repository, engine)), completion)
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Vec<u8>) {
    let request = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => request
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, bytes.to_vec())
}

fn parse<T: DeserializeOwned>(bytes: &[u8]) -> T {
    serde_json::from_slice(bytes).unwrap()
}

async fn create(app: &Router, content: &str) -> Influence {
    let (status, body) = send(app, "POST", "/influences", Some(json!({ "content": content }))).await;
    assert_eq!(status, StatusCode::CREATED);
    parse(&body)
}

#[tokio::test]
async fn test_health() {
    let (app, _) = test_app();
    let (status, body) = send(&app, "GET", "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(parse::<Value>(&body)["status"], "healthy");
}

#[tokio::test]
async fn test_empty_content_is_rejected_with_user_message() {
    let (app, _) = test_app();
    let (status, body) = send(&app, "POST", "/influences", Some(json!({ "content": "   " }))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(parse::<Value>(&body)["error"], "Cannot save an empty influence.");

    let (_, body) = send(&app, "GET", "/influences", None).await;
    assert!(parse::<Vec<Influence>>(&body).is_empty());
}

#[tokio::test]
async fn test_create_list_and_link() {
    let (app, _) = test_app();
    let book = create(&app, "  Read a book on stoicism ").await;
    let walk = create(&app, "Took a long walk without my phone").await;
    assert_eq!(book.content, "Read a book on stoicism");

    let (status, body) = send(&app, "GET", "/influences", None).await;
    assert_eq!(status, StatusCode::OK);
    let listed: Vec<Influence> = parse(&body);
    assert_eq!(listed.len(), 2);
    assert!(listed[0].created_at >= listed[1].created_at);

    let link_body = json!({ "source_id": book.id, "target_id": walk.id });
    let (status, body) = send(&app, "POST", "/links", Some(link_body.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    let link: InfluenceLink = parse(&body);

    // Same pair again returns the existing link
    let (_, body) = send(&app, "POST", "/links", Some(link_body)).await;
    assert_eq!(parse::<InfluenceLink>(&body).id, link.id);

    let (_, body) = send(&app, "GET", &format!("/influences/{}/links", walk.id), None).await;
    assert_eq!(parse::<Vec<InfluenceLink>>(&body), vec![link.clone()]);

    let (_, body) = send(&app, "GET", "/timeline", None).await;
    let entries: Vec<TimelineEntry> = parse(&body);
    let book_entry = entries.iter().find(|e| e.influence.id == book.id).unwrap();
    assert_eq!(book_entry.leads_to[0].content, walk.content);
    let walk_entry = entries.iter().find(|e| e.influence.id == walk.id).unwrap();
    assert_eq!(walk_entry.from[0].content, book.content);

    let (_, body) = send(&app, "GET", "/graph", None).await;
    let graph: InfluenceGraph = parse(&body);
    assert_eq!(graph.nodes.len(), 2);
    assert_eq!(graph.links.len(), 1);
}

#[tokio::test]
async fn test_invalid_links() {
    let (app, _) = test_app();
    let only = create(&app, "Started therapy").await;

    let (status, body) = send(
        &app,
        "POST",
        "/links",
        Some(json!({ "source_id": only.id, "target_id": only.id })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(parse::<Value>(&body)["error"], "An influence cannot be linked to itself.");

    let (status, _) = send(
        &app,
        "POST",
        "/links",
        Some(json!({ "source_id": only.id, "target_id": 404 })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_cascades_to_links() {
    let (app, _) = test_app();
    let a = create(&app, "Moved to a new city").await;
    let b = create(&app, "Felt lonely on weekends").await;
    send(&app, "POST", "/links", Some(json!({ "source_id": a.id, "target_id": b.id }))).await;

    let (status, _) = send(&app, "DELETE", &format!("/influences/{}", a.id), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, body) = send(&app, "GET", &format!("/influences/{}/links", b.id), None).await;
    assert!(parse::<Vec<InfluenceLink>>(&body).is_empty());

    let (status, body) = send(&app, "DELETE", &format!("/influences/{}", a.id), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(parse::<Value>(&body)["error"], "That influence no longer exists.");
}

#[tokio::test]
async fn test_weekly_reflection_on_empty_journal() {
    let (app, completion) = test_app();
    let (status, body) = send(&app, "POST", "/reflections/weekly", None).await;

    assert_eq!(status, StatusCode::OK);
    let value: Value = parse(&body);
    assert_eq!(value["kind"], "empty_state");
    assert_eq!(value["text"], WEEKLY_EMPTY_MESSAGE);
    assert!(completion.prompts.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_generated_reflections() {
    let (app, completion) = test_app();
    let sleep = create(&app, "Went to bed before eleven").await;
    let focus = create(&app, "Finished a deep work block").await;
    send(&app, "POST", "/links", Some(json!({ "source_id": sleep.id, "target_id": focus.id }))).await;

    let (_, body) = send(&app, "POST", "/reflections/weekly", None).await;
    assert_eq!(
        parse::<Reflection>(&body),
        Reflection::Generated("You keep returning to rest and attention.".to_string())
    );

    let (_, body) = send(&app, "POST", &format!("/influences/{}/analysis", sleep.id), None).await;
    assert!(matches!(parse::<Reflection>(&body), Reflection::Generated(_)));

    let prompts = completion.prompts.lock().unwrap();
    assert_eq!(prompts.len(), 2);
    assert!(prompts[0].contains("- Went to bed before eleven"));
    assert!(prompts[1].contains("Main Thought: \"Went to bed before eleven\""));
    assert!(prompts[1].contains("- \"Finished a deep work block\""));
}

#[tokio::test]
async fn test_analysis_of_missing_influence_is_generic_failure() {
    let (app, _) = test_app();
    let (status, body) = send(&app, "POST", "/influences/77/analysis", None).await;

    assert_eq!(status, StatusCode::OK);
    let reflection: Reflection = parse(&body);
    assert_eq!(
        reflection,
        Reflection::Failed("Failed to analyze connections. Please try again.".to_string())
    );
}

#[tokio::test]
async fn test_malformed_bodies_get_json_errors() {
    let (app, _) = test_app();

    let (status, body) = send(&app, "POST", "/influences", Some(json!({ "text": "wrong field" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let error = parse::<Value>(&body)["error"].as_str().unwrap().to_string();
    assert!(!error.contains("missing field"));

    let (status, body) = send(
        &app,
        "POST",
        "/links",
        Some(json!({ "source_id": "x", "target_id": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(parse::<Value>(&body)["error"].is_string());

    let (_, body) = send(&app, "GET", "/influences", None).await;
    assert!(parse::<Vec<Influence>>(&body).is_empty());
}

#[tokio::test]
async fn test_non_numeric_id_gets_json_error() {
    let (app, _) = test_app();

    for (method, uri) in [
        ("DELETE", "/influences/abc"),
        ("GET", "/influences/abc/links"),
        ("POST", "/influences/abc/analysis"),
    ] {
        let (status, body) = send(&app, method, uri, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{method} {uri}");
        assert_eq!(parse::<Value>(&body)["error"], "That influence id is not valid.");
    }
}
