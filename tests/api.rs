use axum::{body::Body, Router};
use http::{header, Method, Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use poll_backend::{
    config::{Config, StoreBackend},
    routes::create_routes,
    state::AppState,
    store::MemoryStore,
};

fn app() -> Router {
    let config = Config {
        port: 0,
        store_backend: StoreBackend::Memory,
        database_url: None,
        max_connections: 1,
        session_ttl_hours: 1,
    };
    create_routes(AppState::new(MemoryStore::new(), config))
}

async fn call(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(body) => request
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string())),
        None => request.body(Body::empty()),
    }
    .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn sign_up(app: &Router, email: &str) -> String {
    let (status, _) = call(
        app,
        Method::POST,
        "/api/accounts/register",
        None,
        Some(json!({
            "first_name": "Test",
            "last_name": "User",
            "email": email,
            "password": "Sup3rSecret",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = call(
        app,
        Method::POST,
        "/api/accounts/login",
        None,
        Some(json!({ "email": email, "password": "Sup3rSecret" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    body["access"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn health_needs_no_token() {
    let (status, body) = call(&app(), Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn poll_routes_require_authentication() {
    let app = app();
    let (status, _) = call(&app, Method::GET, "/api/polls", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = call(&app, Method::GET, "/api/polls", Some("bogus"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn mcq_poll_lifecycle_over_http() {
    let app = app();
    let alice = sign_up(&app, "alice@example.com").await;
    let bob = sign_up(&app, "bob@example.com").await;

    let (status, poll) = call(
        &app,
        Method::POST,
        "/api/polls",
        Some(&alice),
        Some(json!({
            "question": "2+2=?",
            "poll_type": "mcq",
            "duration": 1,
            "result_visibility": "public",
            "options": [{"text": "3"}, {"text": "4"}, {"text": "5"}],
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(poll["options"].as_array().unwrap().len(), 3);
    assert_eq!(poll["is_expired"], false);
    let poll_id = poll["id"].as_i64().unwrap();
    let four = poll["options"][1]["id"].as_i64().unwrap();

    let vote_uri = format!("/api/polls/{poll_id}/vote");
    let ballot = json!({ "option": four });
    let (status, vote) = call(&app, Method::POST, &vote_uri, Some(&bob), Some(ballot.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(vote["option"], four);

    let (status, body) = call(&app, Method::POST, &vote_uri, Some(&bob), Some(ballot)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "You have already voted on this poll.");

    let results_uri = format!("/api/polls/{poll_id}/results");
    let (status, _) = call(&app, Method::GET, &results_uri, Some(&bob), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, results) = call(&app, Method::GET, &results_uri, Some(&alice), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(results["total_votes"], 1);
    assert_eq!(results["options"][1]["vote_count"], 1);

    let (status, listed) = call(&app, Method::GET, "/api/polls", Some(&bob), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed.as_array().unwrap().len(), 1);

    let poll_uri = format!("/api/polls/{poll_id}");
    let (status, _) = call(&app, Method::DELETE, &poll_uri, Some(&bob), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = call(&app, Method::DELETE, &poll_uri, Some(&alice), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, listed) = call(&app, Method::GET, "/api/polls", Some(&bob), None).await;
    assert!(listed.as_array().unwrap().is_empty());
    let (_, mine) = call(&app, Method::GET, "/api/polls/my-polls", Some(&alice), None).await;
    assert_eq!(mine[0]["is_active"], false);
}

#[tokio::test]
async fn toggle_visibility_is_owner_only() {
    let app = app();
    let alice = sign_up(&app, "alice@example.com").await;
    let bob = sign_up(&app, "bob@example.com").await;

    let (_, poll) = call(
        &app,
        Method::POST,
        "/api/polls",
        Some(&alice),
        Some(json!({ "question": "Tabs?", "poll_type": "tf", "duration": 2 })),
    )
    .await;
    let texts: Vec<&str> = poll["options"]
        .as_array()
        .unwrap()
        .iter()
        .map(|o| o["text"].as_str().unwrap())
        .collect();
    assert_eq!(texts, ["True", "False"]);
    let uri = format!("/api/polls/{}/toggle-visibility", poll["id"]);

    let (status, body) = call(&app, Method::PATCH, &uri, Some(&alice), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result_visibility"], "private");

    let (_, body) = call(&app, Method::PATCH, &uri, Some(&alice), None).await;
    assert_eq!(body["result_visibility"], "public");

    let (status, _) = call(&app, Method::PATCH, &uri, Some(&bob), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let missing = "/api/polls/999/toggle-visibility";
    let (status, _) = call(&app, Method::PATCH, missing, Some(&alice), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn comment_poll_with_option_is_rejected() {
    let app = app();
    let alice = sign_up(&app, "alice@example.com").await;

    let (status, body) = call(
        &app,
        Method::POST,
        "/api/polls",
        Some(&alice),
        Some(json!({
            "question": "Feedback?",
            "poll_type": "comment",
            "duration": 72,
            "options": [{"text": "not allowed"}],
        })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Comment polls cannot have options.");
}

#[tokio::test]
async fn update_cannot_change_poll_type() {
    let app = app();
    let alice = sign_up(&app, "alice@example.com").await;
    let (_, poll) = call(
        &app,
        Method::POST,
        "/api/polls",
        Some(&alice),
        Some(json!({
            "question": "Lunch?",
            "poll_type": "mcq",
            "duration": 3,
            "options": [{"text": "Pizza"}, {"text": "Sushi"}],
        })),
    )
    .await;
    let uri = format!("/api/polls/{}", poll["id"]);

    let retype = json!({ "poll_type": "comment" });
    let (status, body) = call(&app, Method::PATCH, &uri, Some(&alice), Some(retype)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Poll type cannot be changed.");

    let (status, updated) = call(
        &app,
        Method::PATCH,
        &uri,
        Some(&alice),
        Some(json!({ "options": [{"text": "Tacos"}, {"text": "Ramen"}, {"text": "Salad"}] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["options"][2]["text"], "Salad");
}

#[tokio::test]
async fn me_returns_profile_without_password() {
    let app = app();
    let token = sign_up(&app, "carol@example.com").await;

    let (status, body) = call(&app, Method::GET, "/api/accounts/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["email"], "carol@example.com");
    assert!(body.get("password_hash").is_none());
}

#[tokio::test]
async fn malformed_payloads_get_json_errors() {
    let app = app();
    let alice = sign_up(&app, "dave@example.com").await;

    let bodies = [
        json!({ "question": "Essay?", "poll_type": "essay", "duration": 1 }),
        json!({
            "question": "Secret?",
            "poll_type": "tf",
            "duration": 1,
            "result_visibility": "secret",
        }),
        json!({ "question": "Bare?", "poll_type": "mcq", "duration": 1, "options": ["a", "b"] }),
    ];
    for body in bodies {
        let (status, body) = call(&app, Method::POST, "/api/polls", Some(&alice), Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().is_some_and(|m| !m.is_empty()));
    }

    let (status, body) = call(&app, Method::GET, "/api/polls/abc", Some(&alice), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let uri = "/api/polls/abc/vote";
    let ballot = json!({ "option": "four" });
    let (status, body) = call(&app, Method::POST, uri, Some(&alice), Some(ballot)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}
