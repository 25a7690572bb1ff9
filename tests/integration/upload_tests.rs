//! Upload endpoint and static serving of stored files.

use crate::test_utils::{multipart_request, request, setup_test_app};
use axum::http::{header, Method, StatusCode};
use campus_common::Role;
use serde_json::json;

#[tokio::test]
async fn test_upload_and_fetch() {
    let app = setup_test_app().await;
    let (_, token) = app.user_with_session("Ada", "ada@campus.edu", Role::User).await;

    let response = app
        .send(multipart_request(
            "/upload",
            Some(&token),
            &[("file", Some("event poster.png"), b"\x89PNG fake image".as_slice())],
        ))
        .await;
    assert_eq!(response.status, StatusCode::OK);

    let path = response.body["path"].as_str().unwrap().to_string();
    assert!(path.starts_with("/uploads/"));
    assert!(path.ends_with("-event_poster.png"));
    assert_eq!(app.stored_upload_count(), 1);

    let response = app.get(&path, None).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.bytes, b"\x89PNG fake image");
}

#[tokio::test]
async fn test_upload_without_file_field_writes_nothing() {
    let app = setup_test_app().await;
    let (_, token) = app.user_with_session("Ada", "ada@campus.edu", Role::User).await;

    let response = app
        .send(multipart_request(
            "/upload",
            Some(&token),
            &[("caption", None, b"no file here".as_slice())],
        ))
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body, json!({"error": "No file provided"}));
    assert_eq!(app.stored_upload_count(), 0);
}

#[tokio::test]
async fn test_upload_with_empty_file_writes_nothing() {
    let app = setup_test_app().await;
    let (_, token) = app.user_with_session("Ada", "ada@campus.edu", Role::User).await;

    let response = app
        .send(multipart_request("/upload", Some(&token), &[("file", Some("empty.txt"), b"".as_slice())]))
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(app.stored_upload_count(), 0);
}

#[tokio::test]
async fn test_non_multipart_upload_is_rejected() {
    let app = setup_test_app().await;
    let (_, token) = app.user_with_session("Ada", "ada@campus.edu", Role::User).await;

    let response = app
        .send(request(Method::POST, "/upload", Some(&token), Some(json!({"file": "x"}))))
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert!(response.body["error"].is_string());
    assert_eq!(app.stored_upload_count(), 0);
}

#[tokio::test]
async fn test_anonymous_upload_is_redirected() {
    let app = setup_test_app().await;

    let response = app
        .send(multipart_request("/upload", None, &[("file", Some("a.txt"), b"data".as_slice())]))
        .await;
    assert_eq!(response.status, StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(response.headers[header::LOCATION], "/login?callbackUrl=/upload");
    assert_eq!(app.stored_upload_count(), 0);
}

#[tokio::test]
async fn test_missing_upload_is_not_found() {
    let app = setup_test_app().await;
    let response = app.get("/uploads/does-not-exist.png", None).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}
