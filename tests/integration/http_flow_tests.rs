//! End-to-end HTTP flows through the assembled router.

use crate::test_utils::{setup_test_app, setup_test_app_with, StubModerator, ADMIN_EMAIL, FLAGGED_WORD, PASSWORD};
use axum::http::{header, StatusCode};
use campus_common::Role;
use chrono::{Duration, Utc};
use serde_json::{json, Value};

fn event_body(title: &str, deadline_in: Duration, capacity: i64) -> Value {
    json!({
        "title": title,
        "content": "Bring a laptop",
        "deadline": (Utc::now() + deadline_in).to_rfc3339(),
        "location": "Engineering building",
        "capacity": capacity
    })
}

#[tokio::test]
async fn test_health() {
    let app = setup_test_app().await;
    let response = app.get("/health", None).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.bytes, b"ok");
}

#[tokio::test]
async fn test_guard_redirects_anonymous_requests() {
    let app = setup_test_app().await;

    let response = app
        .post_json("/events/create", None, event_body("x", Duration::days(1), 10))
        .await;
    assert_eq!(response.status, StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(
        response.headers[header::LOCATION],
        "/login?callbackUrl=/events/create"
    );

    let response = app.get("/admin/users", None).await;
    assert_eq!(response.status, StatusCode::TEMPORARY_REDIRECT);

    // Unknown tokens are anonymous too
    let response = app.post_json("/posts/create", Some("bogus"), json!({})).await;
    assert_eq!(response.status, StatusCode::TEMPORARY_REDIRECT);
}

#[tokio::test]
async fn test_guard_redirect_keeps_query_string() {
    let app = setup_test_app().await;

    let response = app.get("/admin/users?role=ADMIN&page=2", None).await;
    assert_eq!(response.status, StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(
        response.headers[header::LOCATION],
        "/login?callbackUrl=/admin/users%3Frole%3DADMIN%26page%3D2"
    );
}

#[tokio::test]
async fn test_unprotected_paths_allow_anonymous() {
    let app = setup_test_app().await;

    let response = app.get("/communities", None).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body, json!([]));

    let response = app.get("/events/upcoming", None).await;
    assert_eq!(response.status, StatusCode::OK);

    let response = app.get("/events/some-id/check-in/count", None).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body, json!({"eventId": "some-id", "count": 0}));
}

#[tokio::test]
async fn test_register_login_session_logout() {
    let app = setup_test_app().await;

    let response = app
        .post_json(
            "/auth/register",
            None,
            json!({"name": "Ada", "email": "Ada@Campus.edu", "password": PASSWORD}),
        )
        .await;
    assert_eq!(response.status, StatusCode::CREATED);
    assert_eq!(response.body["email"], "ada@campus.edu");
    assert_eq!(response.body["role"], "USER");

    let response = app
        .post_json(
            "/auth/register",
            None,
            json!({"name": "Ada again", "email": "ada@campus.edu", "password": PASSWORD}),
        )
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);

    let response = app
        .post_json(
            "/auth/login",
            None,
            json!({"email": "ada@campus.edu", "password": "Wrong-passw0rd!"}),
        )
        .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.body, json!({"error": "Invalid email or password"}));

    // Unknown accounts are indistinguishable from a wrong password
    let response = app
        .post_json(
            "/auth/login",
            None,
            json!({"email": "nobody@campus.edu", "password": PASSWORD}),
        )
        .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.body, json!({"error": "Invalid email or password"}));

    let response = app
        .post_json(
            "/auth/login",
            None,
            json!({"email": "ada@campus.edu", "password": PASSWORD}),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
    let token = response.body["token"].as_str().unwrap().to_string();
    let cookie = response.headers[header::SET_COOKIE].to_str().unwrap();
    assert!(cookie.starts_with(&format!("campus_session={token}")));
    assert!(cookie.contains("HttpOnly"));

    let response = app.get("/auth/session", Some(&token)).await;
    assert_eq!(response.body["authenticated"], true);
    assert_eq!(response.body["role"], "USER");

    let response = app.post_json("/auth/logout", Some(&token), json!({})).await;
    assert_eq!(response.status, StatusCode::OK);

    let response = app.get("/auth/session", Some(&token)).await;
    assert_eq!(response.body, json!({"authenticated": false}));
}

#[tokio::test]
async fn test_weak_password_is_rejected() {
    let app = setup_test_app().await;
    let response = app
        .post_json(
            "/auth/register",
            None,
            json!({"name": "Bob", "email": "bob@campus.edu", "password": "password"}),
        )
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert!(response.body["error"].as_str().unwrap().contains("Password"));
}

#[tokio::test]
async fn test_admin_endpoints_require_admin_role() {
    let app = setup_test_app().await;
    let (_, user_token) = app.user_with_session("Zed", "zed@campus.edu", Role::User).await;
    let (_, admin_token) = app.user_with_session("Dean", ADMIN_EMAIL, Role::Admin).await;

    let response = app.get("/admin/users", Some(&user_token)).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.body, json!({"error": "Admin access required"}));

    let response = app.get("/admin/users", Some(&admin_token)).await;
    assert_eq!(response.status, StatusCode::OK);
    let names: Vec<_> = response.body.as_array().unwrap().iter().map(|u| u["name"].clone()).collect();
    assert_eq!(names, vec![json!("Dean"), json!("Zed")]);
    assert!(response.body[0].get("passwordHash").is_none());
}

#[tokio::test]
async fn test_admin_updates_permissions() {
    let app = setup_test_app().await;
    let (user, user_token) = app.user_with_session("Zed", "zed@campus.edu", Role::User).await;
    let (_, admin_token) = app.user_with_session("Dean", ADMIN_EMAIL, Role::Admin).await;

    let body = json!({"userId": user.id, "role": "ADMIN", "permissions": ["events:manage"]});

    let response = app.patch_json("/admin/users/permissions", Some(&user_token), body.clone()).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);

    let response = app.patch_json("/admin/users/permissions", Some(&admin_token), body).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["role"], "ADMIN");
    assert_eq!(response.body["permissions"], json!(["events:manage"]));

    // Sessions are immutable: the old token keeps its original role
    let response = app.get("/auth/session", Some(&user_token)).await;
    assert_eq!(response.body["role"], "USER");

    let response = app
        .patch_json(
            "/admin/users/permissions",
            Some(&admin_token),
            json!({"userId": "missing", "permissions": []}),
        )
        .await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(response.body, json!({"error": "User not found"}));

    let response = app
        .patch_json(
            "/admin/users/permissions",
            Some(&admin_token),
            json!({"userId": user.id, "permissions": ["Not Valid"]}),
        )
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_event_lifecycle() {
    let app = setup_test_app().await;
    let (ada, ada_token) = app.user_with_session("Ada", "ada@campus.edu", Role::User).await;
    let (bob, bob_token) = app.user_with_session("Bob", "bob@campus.edu", Role::User).await;
    let (_, admin_token) = app.user_with_session("Dean", ADMIN_EMAIL, Role::Admin).await;

    let response = app
        .post_json("/events/create", Some(&ada_token), event_body("Hackathon", Duration::days(2), 2))
        .await;
    assert_eq!(response.status, StatusCode::CREATED);
    assert_eq!(response.body["registered"], 0);
    let event_id = response.body["id"].as_str().unwrap().to_string();

    let response = app.get("/events/upcoming", None).await;
    assert_eq!(response.body[0]["id"], event_id.as_str());

    for token in [&ada_token, &bob_token] {
        let response = app
            .post_json(&format!("/events/{event_id}/register"), Some(token), json!({}))
            .await;
        assert_eq!(response.status, StatusCode::OK);
    }

    let response = app
        .post_json(&format!("/events/{event_id}/register"), Some(&admin_token), json!({}))
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body, json!({"error": "Event is full"}));

    let check_in = format!("/events/{event_id}/check-in");

    // Users may only check themselves in
    let response = app.post_json(&check_in, Some(&ada_token), json!({"userId": bob.id})).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);

    let response = app.post_json(&check_in, Some(&ada_token), json!({"userId": ada.id})).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["checkedIn"], true);

    let response = app.post_json(&check_in, Some(&admin_token), json!({"userId": bob.id})).await;
    assert_eq!(response.status, StatusCode::OK);

    let response = app.post_json(&check_in, Some(&admin_token), json!({"userId": "nobody"})).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);

    let response = app.get(&format!("/events/{event_id}/check-in/count"), None).await;
    assert_eq!(response.body, json!({"eventId": event_id, "count": 2}));

    let response = app
        .post_json("/events/unknown/register", Some(&ada_token), json!({}))
        .await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_event_creation_is_validated_and_moderated() {
    let app = setup_test_app().await;
    let (_, token) = app.user_with_session("Ada", "ada@campus.edu", Role::User).await;

    let response = app
        .post_json("/events/create", Some(&token), event_body("Too late", -Duration::hours(1), 10))
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);

    let response = app
        .post_json("/events/create", Some(&token), json!({"title": "Missing fields"}))
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert!(response.body["error"].is_string());

    let response = app
        .post_json(
            "/events/create",
            Some(&token),
            event_body(&format!("A {FLAGGED_WORD} party"), Duration::days(1), 10),
        )
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert!(response.body["error"].as_str().unwrap().contains("harassment"));

    assert!(app.state.store.latest_events(10).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_posts_and_likes() {
    let app = setup_test_app().await;
    let (_, token) = app.user_with_session("Ada", "ada@campus.edu", Role::User).await;

    let mut ids = Vec::new();
    for title in ["first", "second", "third"] {
        let response = app
            .post_json("/posts/create", Some(&token), json!({"title": title, "content": "hello"}))
            .await;
        assert_eq!(response.status, StatusCode::CREATED);
        ids.push(response.body["id"].as_str().unwrap().to_string());
    }

    let response = app.post_json(&format!("/posts/{}/like", ids[0]), Some(&token), json!({})).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["likes"], 1);

    let response = app.get("/posts/top?limit=1", None).await;
    assert_eq!(response.body.as_array().unwrap().len(), 1);
    assert_eq!(response.body[0]["id"], ids[0].as_str());

    let response = app.get("/posts/latest", None).await;
    assert_eq!(response.body[0]["id"], ids[2].as_str());

    let response = app.get("/posts/latest?limit=abc", None).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);

    let response = app.post_json("/posts/missing/like", Some(&token), json!({})).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_communities() {
    let app = setup_test_app().await;
    let (_, token) = app.user_with_session("Ada", "ada@campus.edu", Role::User).await;

    for name in ["Robotics", "Chess"] {
        let response = app
            .post_json(
                "/communities/create",
                Some(&token),
                json!({"name": name, "description": "Weekly meetups", "image": "/uploads/logo.png"}),
            )
            .await;
        assert_eq!(response.status, StatusCode::CREATED);
    }

    let response = app.get("/communities", None).await;
    assert_eq!(response.body[0]["name"], "Chess");
    assert_eq!(response.body[1]["name"], "Robotics");
}

#[tokio::test]
async fn test_moderate_endpoint() {
    let app = setup_test_app().await;

    let response = app.post_json("/moderate", None, json!({"text": "hello there"})).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["safe"], true);

    let response = app
        .post_json("/moderate", None, json!({"text": format!("you are {FLAGGED_WORD}")}))
        .await;
    assert_eq!(response.body["safe"], false);
    assert_eq!(response.body["categories"]["harassment"], true);
}

#[tokio::test]
async fn test_unreachable_moderation_fails_open() {
    let app = setup_test_app_with(|_| {}, StubModerator::unreachable()).await;
    let (_, token) = app.user_with_session("Ada", "ada@campus.edu", Role::User).await;

    let response = app
        .post_json("/moderate", None, json!({"text": format!("you are {FLAGGED_WORD}")}))
        .await;
    assert_eq!(response.body, json!({"safe": true, "categories": {}}));

    // Submissions are not blocked either
    let response = app
        .post_json(
            "/posts/create",
            Some(&token),
            json!({"title": "Hi", "content": format!("{FLAGGED_WORD} but unchecked")}),
        )
        .await;
    assert_eq!(response.status, StatusCode::CREATED);
}
