mod common;

use axum::http::{header, Request, StatusCode};
use axum::body::Body;
use common::{location, spawn_app, EXEMPT_EMAIL};
use gate_service::models::Identity;
use std::time::Duration;
use tower::ServiceExt;

#[tokio::test]
async fn anonymous_dashboard_and_profile_redirect_to_signin() {
    let app = spawn_app();

    for path in ["/dashboard", "/dashboard/", "/profile", "/profile/edit"] {
        let response = app.get(path, None).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER, "{}", path);
        assert_eq!(location(&response), Some("/auth/signin"), "{}", path);
    }
}

#[tokio::test]
async fn anonymous_admin_redirects_to_signin() {
    let app = spawn_app();

    let response = app.get("/admin/", None).await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), Some("/auth/signin"));
}

#[tokio::test]
async fn paid_user_is_served_the_dashboard() {
    let app = spawn_app();
    let user = app.seed_paid("u1", "paid@example.com");

    let response = app.get("/dashboard/", Some(&user)).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(location(&response).is_none());
}

#[tokio::test]
async fn unpaid_user_is_sent_to_subscription() {
    let app = spawn_app();
    let user = app.seed_user("u1", "free@example.com");

    let response = app.get("/dashboard/", Some(&user)).await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), Some("/auth/subscription"));
}

#[tokio::test]
async fn exempt_user_passes_while_unpaid() {
    let app = spawn_app();
    let owner = app.seed_user("owner", EXEMPT_EMAIL);

    let response = app.get("/dashboard/", Some(&owner)).await;

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn non_admin_is_sent_to_dashboard() {
    let app = spawn_app();
    let user = app.seed_paid("u1", "paid@example.com");

    let response = app.get("/admin/", Some(&user)).await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), Some("/dashboard"));
}

#[tokio::test]
async fn unpaid_admin_reaches_admin_pages() {
    let app = spawn_app();
    let admin = app.seed_admin("a1", "admin@example.com");

    let response = app.get("/admin/", Some(&admin)).await;

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn signed_in_user_skips_signin_but_keeps_subscription() {
    let app = spawn_app();
    let user = app.seed_user("u1", "free@example.com");

    let signin = app.get("/auth/signin", Some(&user)).await;
    assert_eq!(signin.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&signin), Some("/dashboard"));

    let subscription = app.get("/auth/subscription", Some(&user)).await;
    assert_ne!(subscription.status(), StatusCode::SEE_OTHER);
    assert!(location(&subscription).is_none());
}

#[tokio::test]
async fn unavailable_store_fails_open_on_protected_routes() {
    let app = spawn_app();
    let user = app.seed_user("u1", "free@example.com");
    app.store.set_unavailable(true);

    let dashboard = app.get("/dashboard/", Some(&user)).await;
    assert_eq!(dashboard.status(), StatusCode::OK);

    let admin = app.get("/admin/", Some(&user)).await;
    assert_eq!(location(&admin), Some("/dashboard"));
}

#[tokio::test]
async fn slow_store_fails_open_after_timeout() {
    let app = spawn_app();
    let user = app.seed_user("u1", "free@example.com");
    app.store.set_latency(Some(Duration::from_secs(2)));

    let response = app.get("/dashboard/", Some(&user)).await;

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn static_assets_bypass_the_gate() {
    let app = spawn_app();

    for path in ["/dashboard/logo.png", "/_next/static/chunk.js", "/favicon.ico"] {
        let response = app.get(path, None).await;
        assert!(location(&response).is_none(), "{}", path);
    }
}

#[tokio::test]
async fn static_mount_serves_assets_but_not_pages() {
    let app = spawn_app();

    let response = app.get("/static/app.css", None).await;
    assert_eq!(response.status(), StatusCode::OK);

    for path in [
        "/static/dashboard/index.html",
        "/static/admin/index.html",
        "/static/index.html",
    ] {
        let response = app.get(path, None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{}", path);
    }
}

#[tokio::test]
async fn non_canonical_paths_are_gated_like_their_target() {
    let app = spawn_app();

    for path in [
        "//dashboard/",
        "/%64ashboard/",
        "/%61dmin/",
        "/x/../admin/",
        "/static/../admin/",
        "/dashboard%2Findex.html",
    ] {
        let response = app.get(path, None).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER, "{}", path);
        assert_eq!(location(&response), Some("/auth/signin"), "{}", path);
    }
}

#[tokio::test]
async fn non_canonical_admin_path_rejects_non_admin() {
    let app = spawn_app();
    let user = app.seed_paid("u1", "paid@example.com");

    let response = app.get("//admin/", Some(&user)).await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), Some("/dashboard"));
}

#[tokio::test]
async fn tampered_cookie_is_anonymous() {
    let app = spawn_app();

    let request = Request::builder()
        .uri("/dashboard/")
        .header(header::COOKIE, "session=not-a-jwt")
        .body(Body::empty())
        .unwrap();
    let response = app.router().oneshot(request).await.unwrap();

    assert_eq!(location(&response), Some("/auth/signin"));
}

#[tokio::test]
async fn expiring_session_is_refreshed_on_any_response() {
    let app = spawn_app();
    let user = app.seed_user("u1", "free@example.com");

    let request = Request::builder()
        .uri("/dashboard/")
        .header(
            header::COOKIE,
            app.cookie_for(&user, chrono::Duration::seconds(60)),
        )
        .body(Body::empty())
        .unwrap();
    let response = app.router().oneshot(request).await.unwrap();

    assert_eq!(location(&response), Some("/auth/subscription"));
    let set_cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .unwrap();
    assert!(set_cookie.starts_with("session="));
    assert!(set_cookie.contains("HttpOnly"));
}

#[tokio::test]
async fn public_pages_need_no_session() {
    let app = spawn_app();

    let response = app.get("/", None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let unknown = Identity::new("ghost", "ghost@example.com");
    let response = app.get("/", Some(&unknown)).await;
    assert_eq!(response.status(), StatusCode::OK);
}
