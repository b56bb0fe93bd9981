//! End-to-end tests for CVs, templates, share links, PDF jobs and payments.

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use cvbuilder_core::{MemoryStore, PasswordHasher};
use cvbuilder_server::{build_router, AppState, ServerConfig};
use serde_json::{json, Value};
use tower::ServiceExt;

async fn seeded_app() -> Router {
    let config = ServerConfig::from_lookup(|_| None).unwrap();
    let hasher = PasswordHasher::with_params(1024, 1, 1).unwrap();
    let state = AppState::with_hasher(config, Arc::new(MemoryStore::new()), hasher);
    assert_eq!(state.templates.ensure_defaults().await.unwrap(), 3);
    build_router(state)
}

async fn call(app: &Router, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
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

/// Register `name` and return its access token.
async fn sign_up(app: &Router, name: &str) -> String {
    let (status, body) = call(
        app,
        Method::POST,
        "/api/auth/register",
        None,
        Some(json!({
            "username": name,
            "email": format!("{name}@x.io"),
            "password": "Str0ng!Pass",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body["data"]["accessToken"].as_str().unwrap().to_string()
}

async fn first_layout(app: &Router) -> String {
    let (status, body) = call(app, Method::GET, "/api/templates", None, None).await;
    assert_eq!(status, StatusCode::OK);
    body["data"]["data"][0]["id"].as_str().unwrap().to_string()
}

async fn create_cv(app: &Router, token: &str, title: &str) -> String {
    let layout = first_layout(app).await;
    let (status, body) = call(
        app,
        Method::POST,
        "/api/cvs",
        Some(token),
        Some(json!({"title": title, "layoutId": layout})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["data"]["cv"]["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_cv_lifecycle() {
    let app = seeded_app().await;
    let alice = sign_up(&app, "alice").await;
    let id = create_cv(&app, &alice, "Resume").await;
    let path = format!("/api/cvs/{id}");

    let (status, body) = call(&app, Method::GET, &path, Some(&alice), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["cv"]["title"], "Resume");
    assert_eq!(body["data"]["cv"]["version"], 1);

    let (status, body) = call(&app, Method::PUT, &path, Some(&alice), Some(json!({"title": "Resume v2"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["cv"]["version"], 2);

    let autosave = json!({"data": {"basicDetails": {"name": "Alice"}}});
    let (status, body) = call(&app, Method::PATCH, &format!("{path}/autosave"), Some(&alice), Some(autosave)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["cv"]["version"], 2);
    assert_eq!(body["data"]["cv"]["data"]["basicDetails"]["name"], "Alice");

    let (status, body) = call(&app, Method::POST, &format!("{path}/duplicate"), Some(&alice), None).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["cv"]["title"], "Resume v2 (Copy)");
    assert_eq!(body["data"]["cv"]["version"], 1);

    let (status, body) = call(&app, Method::DELETE, &path, Some(&alice), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["message"], "CV deleted successfully");

    let (status, body) = call(&app, Method::GET, &path, Some(&alice), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["message"], "CV not found");

    let (_, body) = call(&app, Method::GET, "/api/cvs", Some(&alice), None).await;
    assert_eq!(body["data"]["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_cvs_are_private_to_their_owner() {
    let app = seeded_app().await;
    let alice = sign_up(&app, "alice").await;
    let bob = sign_up(&app, "bob").await;
    let id = create_cv(&app, &alice, "Resume").await;
    let path = format!("/api/cvs/{id}");

    for method in [Method::GET, Method::DELETE] {
        let (status, _) = call(&app, method, &path, Some(&bob), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
    let (status, _) = call(&app, Method::PUT, &path, Some(&bob), Some(json!({"title": "Mine"}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, body) = call(&app, Method::GET, "/api/cvs", Some(&bob), None).await;
    assert!(body["data"]["data"].as_array().unwrap().is_empty());

    let (status, _) = call(&app, Method::GET, "/api/cvs", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = call(&app, Method::GET, &path, Some(&alice), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["cv"]["title"], "Resume");
}

#[tokio::test]
async fn test_cv_listing_pages_newest_first() {
    let app = seeded_app().await;
    let alice = sign_up(&app, "alice").await;
    for title in ["First", "Second", "Third"] {
        create_cv(&app, &alice, title).await;
    }

    let (status, page) = call(&app, Method::GET, "/api/cvs?limit=2", Some(&alice), None).await;
    assert_eq!(status, StatusCode::OK);
    let titles: Vec<_> = page["data"]["data"].as_array().unwrap().iter().map(|cv| cv["title"].clone()).collect();
    assert_eq!(titles, vec![json!("Third"), json!("Second")]);
    assert_eq!(page["data"]["hasMore"], true);
    assert!(page["data"]["data"][0].get("data").is_none());

    let cursor = page["data"]["nextCursor"].as_str().unwrap();
    let (_, rest) = call(&app, Method::GET, &format!("/api/cvs?limit=2&cursor={cursor}"), Some(&alice), None).await;
    assert_eq!(rest["data"]["data"].as_array().unwrap().len(), 1);
    assert_eq!(rest["data"]["data"][0]["title"], "First");
    assert_eq!(rest["data"]["hasMore"], false);

    let (status, body) = call(&app, Method::GET, "/api/cvs?cursor=not-a-uuid", Some(&alice), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_create_cv_validation() {
    let app = seeded_app().await;
    let alice = sign_up(&app, "alice").await;

    let (status, body) = call(&app, Method::POST, "/api/cvs", Some(&alice), Some(json!({"title": ""}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let fields: Vec<_> = body["error"]["details"]
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["field"].as_str().unwrap().to_string())
        .collect();
    assert!(fields.contains(&"title".to_string()));
    assert!(fields.contains(&"layoutId".to_string()));

    let unknown_layout = json!({"title": "Resume", "layoutId": uuid::Uuid::new_v4()});
    let (status, _) = call(&app, Method::POST, "/api/cvs", Some(&alice), Some(unknown_layout)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_templates_are_public() {
    let app = seeded_app().await;

    let (status, body) = call(&app, Method::GET, "/api/templates", None, None).await;
    assert_eq!(status, StatusCode::OK);
    let templates = body["data"]["data"].as_array().unwrap();
    assert_eq!(templates.len(), 3);

    let id = templates[0]["id"].as_str().unwrap();
    let (status, body) = call(&app, Method::GET, &format!("/api/templates/{id}"), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["template"]["id"], id);

    let missing = format!("/api/templates/{}", uuid::Uuid::new_v4());
    let (status, _) = call(&app, Method::GET, &missing, None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_share_link_opens_cv_without_login() {
    let app = seeded_app().await;
    let alice = sign_up(&app, "alice").await;
    let id = create_cv(&app, &alice, "Resume").await;

    let (status, body) = call(&app, Method::POST, &format!("/api/cvs/{id}/share"), Some(&alice), None).await;
    assert_eq!(status, StatusCode::CREATED);
    let token = body["data"]["token"].as_str().unwrap().to_string();
    assert_eq!(token.len(), 64);
    assert_eq!(
        body["data"]["shareUrl"],
        format!("http://localhost:3000/share/{token}")
    );

    let (status, body) = call(&app, Method::GET, &format!("/api/share/{token}"), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["cv"]["title"], "Resume");

    let (status, body) = call(&app, Method::GET, "/api/share/deadbeef", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["message"], "Share link not found");

    let (status, _) = call(
        &app,
        Method::POST,
        &format!("/api/cvs/{id}/share"),
        Some(&alice),
        Some(json!({"expiresInSeconds": 0})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = call(
        &app,
        Method::POST,
        &format!("/api/cvs/{id}/email"),
        Some(&alice),
        Some(json!({"email": "recruiter@corp.io"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["message"], "CV sent successfully");
}

#[tokio::test]
async fn test_pdf_jobs_and_payments() {
    let app = seeded_app().await;
    let alice = sign_up(&app, "alice").await;
    let bob = sign_up(&app, "bob").await;
    let id = create_cv(&app, &alice, "Resume").await;

    let (status, body) = call(&app, Method::POST, &format!("/api/cvs/{id}/generate-pdf"), Some(&alice), None).await;
    assert_eq!(status, StatusCode::CREATED);
    let job_path = format!("/api/pdf-jobs/{}", body["data"]["jobId"].as_str().unwrap());

    let (status, body) = call(&app, Method::GET, &job_path, Some(&alice), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["job"]["jobStatus"], "queued");
    let (status, _) = call(&app, Method::GET, &job_path, Some(&bob), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let intent = json!({"amountCents": 499, "cvId": id, "purpose": "premium template"});
    let (status, body) = call(&app, Method::POST, "/api/payments/create-intent", Some(&alice), Some(intent)).await;
    assert_eq!(status, StatusCode::CREATED);
    let payment_id = body["data"]["paymentId"].as_str().unwrap().to_string();
    assert_eq!(body["data"]["clientSecret"], format!("mock_secret_{payment_id}"));

    let (_, body) = call(&app, Method::GET, "/api/payments/history", Some(&alice), None).await;
    let history = body["data"]["data"].as_array().unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0]["currency"], "USD");
    assert_eq!(history[0]["status"], "pending");

    let (status, _) = call(&app, Method::GET, "/api/payments/history", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = call(
        &app,
        Method::POST,
        "/api/payments/webhook",
        None,
        Some(json!({"type": "payment_intent.succeeded"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["message"], "Webhook processed");
}
