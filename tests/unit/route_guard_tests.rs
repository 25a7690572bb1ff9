//! Route guard driven by a configured policy table.

use crate::test_utils::{setup_test_app_with, StubModerator};
use axum::http::{header, StatusCode};
use campus_backend::middleware::RoutePolicy;
use campus_common::Role;

#[tokio::test]
async fn test_configured_policies_replace_defaults() {
    let app = setup_test_app_with(
        |settings| {
            settings.routes.login_path = "/signin".to_string();
            settings.routes.policies = vec![
                RoutePolicy::public("/events/create"),
                RoutePolicy::protected("/communities"),
            ];
        },
        StubModerator::flagging(),
    )
    .await;

    let response = app.get("/communities", None).await;
    assert_eq!(response.status, StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(
        response.headers[header::LOCATION],
        "/signin?callbackUrl=/communities"
    );

    // The guard allows it; the handler still needs a user
    let response = app
        .post_json("/events/create", None, serde_json::json!({}))
        .await;
    assert_ne!(response.status, StatusCode::TEMPORARY_REDIRECT);

    let (_, token) = app.user_with_session("Ada", "ada@campus.edu", Role::User).await;
    let response = app.get("/communities", Some(&token)).await;
    assert_eq!(response.status, StatusCode::OK);
}

#[tokio::test]
async fn test_session_cookie_satisfies_guard() {
    let app = setup_test_app_with(|_| {}, StubModerator::flagging()).await;
    let (_, token) = app.user_with_session("Ada", "ada@campus.edu", Role::User).await;

    let request = axum::http::Request::builder()
        .method("POST")
        .uri("/posts/create")
        .header(header::COOKIE, format!("campus_session={token}"))
        .header(header::CONTENT_TYPE, "application/json")
        .body(axum::body::Body::from(r#"{"title":"Hi","content":"From a cookie"}"#))
        .unwrap();

    let response = app.send(request).await;
    assert_eq!(response.status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_anonymous_handler_rejection_is_json() {
    let app = setup_test_app_with(
        |settings| settings.routes.policies.clear(),
        StubModerator::flagging(),
    )
    .await;

    // Without a guard policy the handler's own check answers with 401
    let response = app
        .post_json("/posts/create", None, serde_json::json!({"title": "a", "content": "b"}))
        .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.body, serde_json::json!({"error": "Authentication required"}));
}
