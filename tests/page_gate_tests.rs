// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Page gate tests against a temporary web root.

use axum::http::{header, StatusCode};
use axum::response::Response;
use primko::config::Config;
use primko::models::Role;
use tempfile::TempDir;

mod common;

use common::{clears_session, get, seed_admin, seed_user, TestApp};

const INDEX_HTML: &str = "<!doctype html><title>Primko</title>";

fn app_with_web_root() -> (TestApp, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("index.html"), INDEX_HTML).unwrap();
    std::fs::create_dir(dir.path().join("assets")).unwrap();
    std::fs::write(dir.path().join("assets").join("app.js"), "console.log(1)").unwrap();

    let mut config = Config::test_default();
    config.web_root = dir.path().to_path_buf();
    (common::create_test_app_with_config(config), dir)
}

fn location(response: &Response) -> &str {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}

async fn body_text(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn test_anonymous_visitor() {
    let (app, _dir) = app_with_web_root();

    let response = app.send(get("/login", None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, INDEX_HTML);

    for path in ["/user", "/admin", "/admin/topup", "/settings"] {
        let response = app.send(get(path, None)).await;
        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT, "path: {path}");
        assert_eq!(location(&response), "/login", "path: {path}");
    }

    // Assets bypass the gate
    let response = app.send(get("/assets/app.js", None)).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_member_is_confined_to_user_pages() {
    let (app, _dir) = app_with_web_root();
    seed_user(&app.store, "u-a", "Ayu", "SET", Role::User, 0, true).await;
    let cookie = app.cookie_for("u-a");

    let response = app.send(get("/user/history", Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, INDEX_HTML);

    for path in ["/admin", "/admin/users", "/administrator", "/login"] {
        let response = app.send(get(path, Some(&cookie))).await;
        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT, "path: {path}");
        assert_eq!(location(&response), "/user", "path: {path}");
    }
}

#[tokio::test]
async fn test_admin_is_confined_to_admin_pages() {
    let (app, _dir) = app_with_web_root();
    seed_admin(&app.store, "admin-1").await;
    let cookie = app.cookie_for("admin-1");

    let response = app.send(get("/admin/topup", Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::OK);

    for path in ["/user", "/", "/register"] {
        let response = app.send(get(path, Some(&cookie))).await;
        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT, "path: {path}");
        assert_eq!(location(&response), "/admin", "path: {path}");
    }
}

#[tokio::test]
async fn test_broken_session_is_cleared() {
    let (app, _dir) = app_with_web_root();

    let response = app.send(get("/user", Some("session=garbage"))).await;
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location(&response), "/login");
    assert!(clears_session(&response));

    let response = app.send(get("/login", Some("session=garbage"))).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(clears_session(&response));
}

#[tokio::test]
async fn test_api_paths_are_not_gated() {
    let (app, _dir) = app_with_web_root();

    let response = app.send(get("/api/user/profile", None)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(location(&response).is_empty());
}
