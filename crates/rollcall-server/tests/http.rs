//! Route-level tests driving the router with in-process requests.

use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use rollcall_server::{router, AppState, CookieSettings, COOKIE_NAME};
use rollcall_testkit::{cast, TestFixture, PASSWORD};

struct Harness {
    fixture: TestFixture,
    app: Router,
}

impl Harness {
    async fn new() -> Self {
        let fixture = TestFixture::new().await;
        let app = router(AppState::new(
            fixture.service.clone(),
            CookieSettings {
                secure: false,
                max_age: Duration::from_secs(3600),
            },
        ));
        Self { fixture, app }
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Option<String>, Value) {
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .map(|v| v.to_str().unwrap().to_string());
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));
        (status, cookie, body)
    }

    async fn login(&self, username: &str) -> String {
        let (status, cookie, _) = self
            .send(post("/login", None, json!({ "username": username, "password": PASSWORD })))
            .await;
        assert_eq!(status, StatusCode::OK);
        let cookie = cookie.unwrap();
        cookie.split(';').next().unwrap().to_string()
    }
}

fn post(uri: &str, cookie: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

#[tokio::test]
async fn login_sets_session_cookie() {
    let h = Harness::new().await;
    let (status, cookie, body) = h
        .send(post("/login", None, json!({ "username": "Ada", "password": PASSWORD })))
        .await;

    assert_eq!(status, StatusCode::OK);
    let cookie = cookie.unwrap();
    assert!(cookie.starts_with(&format!("{}=", COOKIE_NAME)));
    assert!(cookie.contains("HttpOnly"));
    assert_eq!(body["id"], 1);
    assert_eq!(body["isImpersonating"], false);
}

#[tokio::test]
async fn bad_credentials_are_401() {
    let h = Harness::new().await;
    let (status, cookie, body) = h
        .send(post("/login", None, json!({ "username": "ada", "password": "nope" })))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(cookie.is_none());
    assert_eq!(body["error"], "invalid username or password");

    let (status, _, unknown) = h
        .send(post("/login", None, json!({ "username": "ghost", "password": "nope" })))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown, body);
}

#[tokio::test]
async fn current_user_requires_a_session() {
    let h = Harness::new().await;
    let (status, _, _) = h.send(get("/user", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let bogus = format!("{}=not-a-token", COOKIE_NAME);
    let (status, _, _) = h.send(get("/user", Some(&bogus))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn impersonate_and_return() {
    let h = Harness::new().await;
    let cookie = h.login("ada").await;

    let (status, _, body) = h
        .send(post(
            "/impersonation/start",
            Some(&cookie),
            json!({ "targetUserId": 42 }),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["impersonatedUser"]["id"], 42);
    assert_eq!(body["impersonatedUser"]["isImpersonating"], true);
    assert_eq!(body["impersonatedUser"]["originalUserId"], 1);
    assert_eq!(body["originalUser"]["id"], 1);

    let (status, _, user) = h.send(get("/user", Some(&cookie))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(user["id"], 42);
    assert_eq!(user["isImpersonating"], true);
    assert_eq!(user["originalUserId"], 1);
    assert_eq!(user["permissions"]["users.impersonate"], false);

    let (status, _, body) = h
        .send(post("/impersonation/stop", Some(&cookie), json!({})))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["originalUser"]["id"], 1);

    let (_, _, user) = h.send(get("/user", Some(&cookie))).await;
    assert_eq!(user["id"], 1);
    assert_eq!(user["isImpersonating"], false);
    assert!(user.get("originalUserId").is_none());
}

#[tokio::test]
async fn non_elevated_start_is_403() {
    let h = Harness::new().await;
    let cookie = h.login("carl").await;

    let (status, _, body) = h
        .send(post(
            "/impersonation/start",
            Some(&cookie),
            json!({ "targetUserId": 5 }),
        ))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "forbidden");

    let (_, _, user) = h.send(get("/user", Some(&cookie))).await;
    assert_eq!(user["id"], 7);
    assert_eq!(user["isImpersonating"], false);
}

#[tokio::test]
async fn second_start_is_409_and_keeps_state() {
    let h = Harness::new().await;
    let cookie = h.login("ada").await;

    let start = |target: u64| post("/impersonation/start", Some(&cookie), json!({ "targetUserId": target }));
    let (status, _, _) = h.send(start(42)).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _, _) = h.send(start(99)).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, _, user) = h.send(get("/user", Some(&cookie))).await;
    assert_eq!(user["id"], 42);
    assert_eq!(user["originalUserId"], 1);
}

#[tokio::test]
async fn unknown_or_inactive_target_is_404() {
    let h = Harness::new().await;
    let cookie = h.login("ada").await;

    for target in [cast::NOBODY.0, cast::INACTIVE.0] {
        let (status, _, body) = h
            .send(post(
                "/impersonation/start",
                Some(&cookie),
                json!({ "targetUserId": target }),
            ))
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "user not found");
    }
}

#[tokio::test]
async fn stop_without_impersonating_is_409() {
    let h = Harness::new().await;
    let cookie = h.login("ada").await;
    let (status, _, _) = h
        .send(post("/impersonation/stop", Some(&cookie), json!({})))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn logout_while_impersonating_ends_the_session() {
    let h = Harness::new().await;
    let cookie = h.login("ada").await;
    h.send(post(
        "/impersonation/start",
        Some(&cookie),
        json!({ "targetUserId": 42 }),
    ))
    .await;

    let (status, cleared, body) = h.send(post("/logout", Some(&cookie), json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert!(cleared.unwrap().contains("Max-Age=0"));
    assert_eq!(body["ok"], true);

    let (status, _, _) = h.send(get("/user", Some(&cookie))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn switch_role_outcomes() {
    let h = Harness::new().await;
    let admin = h.login("ada").await;

    let (status, _, body) = h
        .send(post("/user/switch-role", Some(&admin), json!({ "role": "billing" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["role"], "billing");
    assert_eq!(body["homeRole"], "super_admin");

    let clerk = h.login("carl").await;
    let (status, _, _) = h
        .send(post("/user/switch-role", Some(&clerk), json!({ "role": "staff" })))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _, body) = h
        .send(post(
            "/user/switch-role",
            Some(&admin),
            json!({ "role": "super_admin" }),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["permissions"]["users.impersonate"], true);

    let (status, _, _) = h
        .send(post(
            "/impersonation/start",
            Some(&admin),
            json!({ "targetUserId": 42 }),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _, body) = h
        .send(post("/user/switch-role", Some(&admin), json!({ "role": "staff" })))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].is_string());

    let (_, _, user) = h.send(get("/user", Some(&admin))).await;
    assert_eq!(user["id"], 42);
    assert_eq!(user["role"], "staff");
}

#[tokio::test]
async fn malformed_body_is_400() {
    let h = Harness::new().await;
    let cookie = h.login("ada").await;
    let (status, _, body) = h
        .send(post(
            "/impersonation/start",
            Some(&cookie),
            json!({ "target": "nina" }),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    assert_eq!(
        h.fixture.state(&token_from_cookie(&cookie)).await.map(|s| s.is_impersonating()),
        Some(false)
    );
}

#[tokio::test]
async fn healthz_and_no_store() {
    let h = Harness::new().await;
    let response = h.app.clone().oneshot(get("/healthz", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CACHE_CONTROL], "no-store");
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], b"ok");
}

fn token_from_cookie(cookie: &str) -> rollcall::SessionToken {
    let (_, value) = cookie.split_once('=').unwrap();
    rollcall::SessionToken::from_hex(value).unwrap()
}
