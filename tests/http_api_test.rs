use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    Router,
};
use chrono::NaiveDate;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::{json, Value};
use tower::ServiceExt;

use mathe_backend::catalog::Catalog;
use mathe_backend::config::AppConfig;
use mathe_backend::domain::ProblemTemplate;
use mathe_backend::engine::FixedClock;
use mathe_backend::grading::Grader;
use mathe_backend::routes::build_router;
use mathe_backend::state::AppState;
use mathe_backend::store::ChallengeStore;

fn catalog() -> Catalog {
    Catalog::new(
        (1..=4)
            .map(|i| ProblemTemplate {
                key: format!("add-{i}"),
                topic: "Addition".into(),
                question: format!("Berechne: {i} + {i} = ?"),
                expected_answer: (i * 2).to_string(),
            })
            .collect(),
    )
    .unwrap()
}

fn state_with(cfg: AppConfig, store: ChallengeStore, grader: Option<Grader>) -> (Arc<AppState>, Arc<FixedClock>) {
    let clock = Arc::new(FixedClock::new(NaiveDate::from_ymd_opt(2026, 2, 2).unwrap()));
    let state = AppState::new(cfg, Arc::new(catalog()), clock.clone(), store, grader, StdRng::seed_from_u64(5));
    (Arc::new(state), clock)
}

fn app_with(cfg: AppConfig, store: ChallengeStore) -> (Router, Arc<FixedClock>) {
    let (state, clock) = state_with(cfg, store, None);
    (build_router(state), clock)
}

fn app() -> (Router, Arc<FixedClock>) {
    app_with(AppConfig::default(), ChallengeStore::memory())
}

async fn call(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let req = match body {
        Some(b) => builder
            .header("content-type", "application/json")
            .body(Body::from(b.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let res = app.clone().oneshot(req).await.unwrap();
    let status = res.status();
    let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
    (status, value)
}

/// Answer for the problem text "Berechne: i + i = ?".
fn solve(question: &str) -> String {
    let i: u32 = question
        .trim_start_matches("Berechne: ")
        .split(' ')
        .next()
        .unwrap()
        .parse()
        .unwrap();
    (i * 2).to_string()
}

#[tokio::test]
async fn health_and_session() {
    let (app, _) = app();
    let (status, body) = call(&app, Method::GET, "/api/v1/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);

    let (status, body) = call(&app, Method::POST, "/api/v1/session", None).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["user"].as_str().unwrap().len(), 32);
}

#[tokio::test]
async fn catalog_lists_durations_and_topics() {
    let (app, _) = app();
    let (status, body) = call(&app, Method::GET, "/api/v1/catalog", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["offeredDurations"], json!([7, 14, 21, 30]));
    assert_eq!(body["problemCount"], 4);
    assert_eq!(body["photoGrading"], false);
    assert_eq!(body["topics"][0]["topic"], "Addition");
}

#[tokio::test]
async fn full_day_flow() {
    let (app, clock) = app();

    let (status, body) = call(&app, Method::GET, "/api/v1/challenge?user=mia", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["challenge"].is_null());

    let (status, body) =
        call(&app, Method::POST, "/api/v1/challenge", Some(json!({"user": "mia", "totalDays": 7}))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["summary"]["currentDay"], 1);
    assert_eq!(body["persisted"], true);

    let (status, body) = call(&app, Method::GET, "/api/v1/problem?user=mia", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "open");
    assert!(body["problem"].get("expectedAnswer").is_none());
    let question = body["problem"]["question"].as_str().unwrap().to_string();

    // reload returns the same question
    let (_, again) = call(&app, Method::GET, "/api/v1/problem?user=mia", None).await;
    assert_eq!(again["problem"]["question"], question.as_str());

    let (status, body) =
        call(&app, Method::POST, "/api/v1/answer", Some(json!({"user": "mia", "answer": "  "}))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "invalid_input");

    let (status, body) = call(
        &app,
        Method::POST,
        "/api/v1/answer",
        Some(json!({"user": "mia", "answer": solve(&question)})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "correct");
    assert_eq!(body["points"], 6);
    assert_eq!(body["summary"]["currentDay"], 2);

    let (status, body) =
        call(&app, Method::POST, "/api/v1/answer", Some(json!({"user": "mia", "answer": "1"}))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "already_done_today");

    let (_, body) = call(&app, Method::GET, "/api/v1/problem?user=mia", None).await;
    assert_eq!(body["status"], "done");

    clock.advance_days(1);
    let (_, body) = call(&app, Method::GET, "/api/v1/problem?user=mia", None).await;
    assert_eq!(body["status"], "open");
    assert_eq!(body["problem"]["day"], 2);
    assert_ne!(body["problem"]["question"], question.as_str());

    let (_, body) =
        call(&app, Method::POST, "/api/v1/answer", Some(json!({"user": "mia", "answer": "wrong"}))).await;
    assert_eq!(body["outcome"], "incorrect");
    assert_eq!(body["points"], 4);

    let (_, summary) = call(&app, Method::GET, "/api/v1/summary?user=mia", None).await;
    assert_eq!(summary["score"], 10);
    assert_eq!(summary["maxPoints"], 42);
    assert_eq!(summary["currentStreak"], 2);

    let (_, dashboard) = call(&app, Method::GET, "/api/v1/challenge?user=mia", None).await;
    assert_eq!(dashboard["challenge"]["history"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn solution_and_share() {
    let (app, _) = app();
    call(&app, Method::POST, "/api/v1/challenge", Some(json!({"user": "leo", "totalDays": 14}))).await;

    let (status, body) = call(&app, Method::GET, "/api/v1/solution?user=leo", None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "no_active_problem");

    let (_, today) = call(&app, Method::GET, "/api/v1/problem?user=leo", None).await;
    let question = today["problem"]["question"].as_str().unwrap().to_string();

    let (_, body) = call(&app, Method::GET, "/api/v1/solution?user=leo", None).await;
    assert_eq!(body["expectedAnswer"], solve(&question).as_str());

    let (status, body) = call(&app, Method::GET, "/api/v1/share?user=leo", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["subject"], "Math challenge – day 1 of 14");
    assert!(body["body"].as_str().unwrap().contains(&question));
}

#[tokio::test]
async fn invalid_requests() {
    let (app, _) = app();
    let (status, body) =
        call(&app, Method::POST, "/api/v1/challenge", Some(json!({"user": "zoe", "totalDays": 3}))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "invalid_duration");

    let (status, body) = call(&app, Method::GET, "/api/v1/summary?user=zoe", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "no_challenge");

    let (status, body) = call(&app, Method::GET, "/api/v1/summary?user=..%2Fetc", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_user");
}

#[tokio::test]
async fn photo_without_grader() {
    let png = "iVBORw0KGgo=";

    let (app, _) = app();
    call(&app, Method::POST, "/api/v1/challenge", Some(json!({"user": "ida", "totalDays": 7}))).await;
    call(&app, Method::GET, "/api/v1/problem?user=ida", None).await;
    let (status, body) = call(
        &app,
        Method::POST,
        "/api/v1/answer/photo",
        Some(json!({"user": "ida", "imageBase64": png, "mime": "image/png"})),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"], "grading_unavailable");
    assert_eq!(body["retryable"], true);
    let (_, summary) = call(&app, Method::GET, "/api/v1/summary?user=ida", None).await;
    assert_eq!(summary["currentDay"], 1);

    let mut cfg = AppConfig::default();
    cfg.rules.allow_ungraded_photos = true;
    let (app, _) = app_with(cfg, ChallengeStore::memory());
    call(&app, Method::POST, "/api/v1/challenge", Some(json!({"user": "ida", "totalDays": 7}))).await;
    call(&app, Method::GET, "/api/v1/problem?user=ida", None).await;

    let (status, body) = call(
        &app,
        Method::POST,
        "/api/v1/answer/photo",
        Some(json!({"user": "ida", "imageBase64": "%%%", "mime": "image/png"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "invalid_image");

    let (status, body) = call(
        &app,
        Method::POST,
        "/api/v1/answer/photo",
        Some(json!({"user": "ida", "imageBase64": png, "mime": "image/png"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["points"], 4);
    assert_eq!(body["outcome"], "incorrect");
}

#[tokio::test]
async fn reset_and_file_store_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    {
        let (app, _) = app_with(AppConfig::default(), ChallengeStore::json_file(dir.path()));
        call(&app, Method::POST, "/api/v1/challenge", Some(json!({"user": "max", "totalDays": 21}))).await;
        let (_, today) = call(&app, Method::GET, "/api/v1/problem?user=max", None).await;
        let answer = solve(today["problem"]["question"].as_str().unwrap());
        call(&app, Method::POST, "/api/v1/answer", Some(json!({"user": "max", "answer": answer}))).await;
    }

    let (app, _) = app_with(AppConfig::default(), ChallengeStore::json_file(dir.path()));
    let (_, summary) = call(&app, Method::GET, "/api/v1/summary?user=max", None).await;
    assert_eq!(summary["totalDays"], 21);
    assert_eq!(summary["score"], 6);
    assert_eq!(summary["doneToday"], true);

    let (status, body) = call(&app, Method::DELETE, "/api/v1/challenge?user=max", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["persisted"], true);
    assert!(!dir.path().join("max.json").exists());

    let (_, body) = call(&app, Method::GET, "/api/v1/challenge?user=max", None).await;
    assert!(body["challenge"].is_null());
}

#[tokio::test]
async fn corrupt_stored_state_starts_fresh() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("eva.json"), r#"{"totalDays": 7, "currentDay": 4, "score": 1}"#).unwrap();
    let (app, _) = app_with(AppConfig::default(), ChallengeStore::json_file(dir.path()));

    let (status, body) = call(&app, Method::GET, "/api/v1/challenge?user=eva", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["challenge"].is_null());
}

#[tokio::test]
async fn unreachable_grader_awards_nothing() {
    let grader = Grader {
        client: reqwest::Client::new(),
        api_key: "test-key".into(),
        base_url: "http://127.0.0.1:1".into(),
        vision_model: "vision-test".into(),
    };
    let (state, _) = state_with(AppConfig::default(), ChallengeStore::memory(), Some(grader));
    let app = build_router(state);
    call(&app, Method::POST, "/api/v1/challenge", Some(json!({"user": "ole", "totalDays": 7}))).await;
    let (_, today) = call(&app, Method::GET, "/api/v1/problem?user=ole", None).await;

    let (status, body) = call(
        &app,
        Method::POST,
        "/api/v1/answer/photo",
        Some(json!({"user": "ole", "imageBase64": "iVBORw0KGgo=", "mime": "image/png"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"], "grading_failed");
    assert_eq!(body["retryable"], true);

    let (_, summary) = call(&app, Method::GET, "/api/v1/summary?user=ole", None).await;
    assert_eq!(summary["score"], 0);
    assert_eq!(summary["currentDay"], 1);
    assert_eq!(summary["doneToday"], false);

    // the day stays open for a typed answer
    let answer = solve(today["problem"]["question"].as_str().unwrap());
    let (status, body) =
        call(&app, Method::POST, "/api/v1/answer", Some(json!({"user": "ole", "answer": answer}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["points"], 6);
}

#[tokio::test]
async fn users_without_a_challenge_leave_no_session_behind() {
    let (state, _) = state_with(AppConfig::default(), ChallengeStore::memory(), None);
    let app = build_router(state.clone());

    call(&app, Method::POST, "/api/v1/session", None).await;
    for user in ["ghost-1", "ghost-2", "ghost-3"] {
        call(&app, Method::GET, &format!("/api/v1/challenge?user={user}"), None).await;
        call(&app, Method::GET, &format!("/api/v1/problem?user={user}"), None).await;
        call(&app, Method::GET, &format!("/api/v1/summary?user={user}"), None).await;
    }
    assert_eq!(state.resident_sessions(), 0);

    call(&app, Method::POST, "/api/v1/challenge", Some(json!({"user": "kim", "totalDays": 7}))).await;
    assert_eq!(state.resident_sessions(), 1);

    call(&app, Method::DELETE, "/api/v1/challenge?user=kim", None).await;
    assert_eq!(state.resident_sessions(), 0);
}

#[tokio::test]
async fn yesterdays_open_problem_needs_a_fresh_draw() {
    let (app, clock) = app();
    call(&app, Method::POST, "/api/v1/challenge", Some(json!({"user": "uwe", "totalDays": 7}))).await;
    let (_, today) = call(&app, Method::GET, "/api/v1/problem?user=uwe", None).await;
    let old_answer = solve(today["problem"]["question"].as_str().unwrap());
    call(&app, Method::GET, "/api/v1/solution?user=uwe", None).await;

    clock.advance_days(1);
    let (status, body) =
        call(&app, Method::POST, "/api/v1/answer", Some(json!({"user": "uwe", "answer": old_answer}))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "no_active_problem");

    let (_, today) = call(&app, Method::GET, "/api/v1/problem?user=uwe", None).await;
    assert_eq!(today["problem"]["day"], 1);
    let answer = solve(today["problem"]["question"].as_str().unwrap());
    let (status, body) =
        call(&app, Method::POST, "/api/v1/answer", Some(json!({"user": "uwe", "answer": answer}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "correct");
}
