use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
};
use chrono::{Duration, Utc};
use meme_hustle::{AppState, config::Config, routes::create_router};
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

fn app() -> (Router, Arc<AppState>) {
    let state = Arc::new(AppState::in_memory(Config::default()));
    (create_router(state.clone()), state)
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::empty()).unwrap()
}

fn post(uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

async fn login(app: &Router, email: &str) -> String {
    let (status, body) = send(app, post("/api/auth/login", None, json!({ "email": email, "password": "meme" }))).await;
    assert_eq!(status, StatusCode::OK, "login failed: {}", body);
    body["data"]["token"].as_str().unwrap().to_string()
}

async fn create_meme(app: &Router, token: &str, title: &str, tags: &[&str]) -> Value {
    let (status, body) = send(
        app,
        post(
            "/api/memes",
            Some(token),
            json!({ "title": title, "image_url": "https://picsum.photos/200", "tags": tags }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "create failed: {}", body);
    body["data"].clone()
}

#[tokio::test]
async fn health_reports_ok() {
    let (app, _) = app();
    let (status, body) = send(&app, get("/", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "OK");
    assert_eq!(body["connections"], 0);
    assert!(body["cache"]["leaderboard"]["hits"].is_number());
}

#[tokio::test]
async fn unknown_routes_return_404_with_path() {
    let (app, _) = app();
    let (status, body) = send(&app, get("/api/nope", None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({ "error": "Route not found", "path": "/api/nope" }));
}

#[tokio::test]
async fn protected_routes_require_a_token() {
    let (app, _) = app();
    let (status, body) = send(&app, get("/api/memes", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Authorization token required");

    let (status, body) = send(&app, get("/api/memes", Some("garbage"))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Invalid token");
}

#[tokio::test]
async fn login_checks_credentials() {
    let (app, _) = app();
    let (status, body) = send(
        &app,
        post("/api/auth/login", None, json!({ "email": "meme@example.com", "password": "wrong" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Invalid credentials");

    let token = login(&app, "vibe@example.com").await;
    let (status, body) = send(&app, get("/api/auth/me", Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["username"], "vibelord");
    assert_eq!(body["data"]["credits"], 750);
}

#[tokio::test]
async fn users_and_docs_are_public() {
    let (app, _) = app();
    let (status, body) = send(&app, get("/api/auth/users", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 5);
    assert!(body["data"][0].get("password").is_none());

    let (status, body) = send(&app, get("/api/auth/docs", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["available_users"].as_array().unwrap().len(), 5);
}

#[tokio::test]
async fn meme_creation_reports_every_validation_problem() {
    let (app, _) = app();
    let token = login(&app, "meme@example.com").await;
    let (status, body) = send(
        &app,
        post("/api/memes", Some(&token), json!({ "title": "", "image_url": "nope", "tags": [] })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Validation failed");
    assert_eq!(body["details"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn meme_lifecycle() {
    let (app, _) = app();
    let token = login(&app, "meme@example.com").await;

    let meme = create_meme(&app, &token, "Doge to the moon", &["doge", "crypto"]).await;
    create_meme(&app, &token, "Grumpy cat", &["cats"]).await;
    assert_eq!(meme["owner_id"], 1);
    assert_eq!(meme["upvotes"], 0);
    assert!(!meme["ai_caption"].as_str().unwrap().is_empty());
    assert!(!meme["vibe_analysis"].as_str().unwrap().is_empty());
    let id = meme["id"].as_str().unwrap();

    let (status, body) = send(&app, get("/api/memes?tags=crypto,nft", Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
    assert_eq!(body["filters"]["tags"], json!(["crypto", "nft"]));
    assert_eq!(body["filters"]["sort_by"], "created_at");

    let (status, body) = send(&app, post(&format!("/api/memes/{}/vote", id), Some(&token), json!({ "type": "up" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["upvotes"], 1);
    send(&app, post(&format!("/api/memes/{}/vote", id), Some(&token), json!({ "type": "down" }))).await;

    let (status, body) = send(&app, get(&format!("/api/memes/{}", id), Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["upvotes"], 1);
    assert_eq!(body["data"]["downvotes"], 1);
    assert_eq!(body["data"]["bids"], json!([]));

    let (status, body) = send(&app, get("/api/memes/leaderboard", Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"][0]["id"], id);

    let (status, body) = send(&app, post(&format!("/api/memes/{}/regenerate-caption", id), Some(&token), json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"].is_string());

    let (status, body) = send(&app, get("/api/memes/tags/trending", Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn trending_limits_are_clamped() {
    let (app, _) = app();
    let token = login(&app, "meme@example.com").await;
    create_meme(&app, &token, "Doge", &["doge"]).await;
    create_meme(&app, &token, "Pepe", &["frogs"]).await;

    let (status, body) = send(&app, get("/api/memes/leaderboard?limit=5000", Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["filters"]["limit"], 100);
    assert_eq!(body["data"].as_array().unwrap().len(), 2);

    let (_, body) = send(&app, get("/api/memes/leaderboard?limit=0", Some(&token))).await;
    assert_eq!(body["filters"]["limit"], 1);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    let (status, body) = send(&app, get("/api/memes/tags/trending?limit=0", Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn malformed_and_missing_ids() {
    let (app, _) = app();
    let token = login(&app, "meme@example.com").await;

    let (status, _) = send(&app, get("/api/memes/not-a-uuid", Some(&token))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(&app, get(&format!("/api/memes/{}", Uuid::new_v4()), Some(&token))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("not found"));
}

#[tokio::test]
async fn bidding_spends_credits_and_ranks_bidders() {
    let (app, state) = app();
    let owner = login(&app, "meme@example.com").await;
    let bidder = login(&app, "crypto@example.com").await;
    let meme = create_meme(&app, &owner, "Stonks", &["stonks"]).await;
    let id = meme["id"].as_str().unwrap();

    let (status, body) = send(&app, post(&format!("/api/bids/{}", id), Some(&bidder), json!({ "credits": 300 }))).await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["data"]["bid"]["username"], "cryptoqueen");
    assert_eq!(body["data"]["remaining_credits"], 1700);
    assert_eq!(state.users.find(4).unwrap().credits, 1700);

    let (status, body) = send(&app, get(&format!("/api/bids/meme/{}", id), Some(&owner))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
    assert_eq!(body["total_credits"], 300);

    let (status, body) = send(&app, get("/api/bids/me", Some(&bidder))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"][0]["meme"]["title"], "Stonks");

    let (status, body) = send(&app, get("/api/leaderboard/bidders", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"][0]["username"], "cryptoqueen");
    assert_eq!(body["data"][0]["total_credits"], 300);
}

#[tokio::test]
async fn bids_are_validated() {
    let (app, state) = app();
    let owner = login(&app, "meme@example.com").await;
    let poor = login(&app, "nft@example.com").await;
    let meme = create_meme(&app, &owner, "Stonks", &["stonks"]).await;
    let id = meme["id"].as_str().unwrap();

    let (status, _) = send(&app, post(&format!("/api/bids/{}", id), Some(&poor), json!({ "credits": 0 }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(&app, post(&format!("/api/bids/{}", id), Some(&poor), json!({ "credits": 500 }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Insufficient credits");
    assert_eq!(state.users.find(5).unwrap().credits, 100);

    let (status, _) = send(
        &app,
        post(&format!("/api/bids/{}", Uuid::new_v4()), Some(&poor), json!({ "credits": 10 })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn leaderboard_ranks_and_refreshes_after_votes() {
    let (app, _) = app();
    let token = login(&app, "meme@example.com").await;
    let first = create_meme(&app, &token, "First", &["a"]).await;
    let second = create_meme(&app, &token, "Second", &["b"]).await;
    let second_id = second["id"].as_str().unwrap();
    send(&app, post(&format!("/api/memes/{}/vote", first["id"].as_str().unwrap()), Some(&token), json!({ "type": "up" }))).await;

    let (status, body) = send(&app, get("/api/leaderboard/memes?top=5&timeframe=week", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"][0]["title"], "First");
    assert_eq!(body["data"][0]["rank"], 1);
    assert_eq!(body["filters"], json!({ "top": 5, "timeframe": "week", "category": "upvotes" }));
    assert!(body["generated_at"].is_string());

    for _ in 0..2 {
        send(&app, post(&format!("/api/memes/{}/vote", second_id), Some(&token), json!({ "type": "up" }))).await;
    }
    let (_, body) = send(&app, get("/api/leaderboard/memes?top=5&timeframe=week", None)).await;
    assert_eq!(body["data"][0]["title"], "Second");
    assert_eq!(body["data"][0]["upvotes"], 2);
}

#[tokio::test]
async fn leaderboard_rejects_bad_parameters() {
    let (app, _) = app();
    let (status, body) = send(&app, get("/api/leaderboard/memes?top=0", None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid query parameters");

    let (status, _) = send(&app, get("/api/leaderboard/memes?timeframe=year", None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, get("/api/leaderboard/memes?category=likes", None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn duel_lifecycle() {
    let (app, _) = app();
    let token = login(&app, "stonks@example.com").await;
    let left = create_meme(&app, &token, "Left", &["duel"]).await;
    let right = create_meme(&app, &token, "Right", &["duel"]).await;
    let (left_id, right_id) = (left["id"].as_str().unwrap(), right["id"].as_str().unwrap());
    let future = (Utc::now() + Duration::minutes(5)).to_rfc3339();

    let (status, _) = send(
        &app,
        post("/api/memeDuel/start", Some(&token), json!({ "meme1": left_id, "meme2": left_id, "timer": future })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let past = (Utc::now() - Duration::minutes(5)).to_rfc3339();
    let (status, _) = send(
        &app,
        post("/api/memeDuel/start", Some(&token), json!({ "meme1": left_id, "meme2": right_id, "timer": past })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &app,
        post("/api/memeDuel/start", Some(&token), json!({ "meme1": left_id, "meme2": right_id, "timer": future })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["data"]["host"], "stonksguy");
    assert_eq!(body["data"]["ended"], false);
    let duel_id = body["data"]["id"].as_str().unwrap().to_string();

    let (status, body) = send(
        &app,
        post(&format!("/api/memeDuel/{}/vote", duel_id), Some(&token), json!({ "meme_id": right_id })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["meme2Upvotes"], 1);
    assert_eq!(body["data"]["meme1Upvotes"], 0);

    let (status, _) = send(
        &app,
        post(&format!("/api/memeDuel/{}/vote", duel_id), Some(&token), json!({ "meme_id": Uuid::new_v4() })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(&app, post(&format!("/api/memeDuel/{}/end", duel_id), Some(&token), json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["ended"], true);
    assert_eq!(body["data"]["remaining_seconds"], 0);

    // Voting after the end is still accepted
    let (status, body) = send(
        &app,
        post(&format!("/api/memeDuel/{}/vote", duel_id), Some(&token), json!({ "memeId": left_id })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["meme1Upvotes"], 1);

    let (status, body) = send(&app, get("/api/memeDuel", Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
}
