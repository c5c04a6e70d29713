//! Site content endpoints with the page cache switched on

mod common;

use common::{detail, test_config, TestServer};
use reqwest::StatusCode;
use schoolhouse::auth::Permission;
use serde_json::{json, Value};

async fn cached_server() -> TestServer {
    let mut config = test_config();
    config.content.cache_enabled = true;
    common::start_with(config).await
}

async fn public_page(server: &TestServer, slug: &str) -> Vec<Value> {
    let response = server
        .client
        .get(server.url(&format!("/api/v1/site-content/public/{}", slug)))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    response.json().await.unwrap()
}

#[tokio::test]
async fn test_public_page_reflects_writes_immediately() {
    let server = cached_server().await;
    let token = server.principal_token();

    // Prime the cache with the empty page
    assert!(public_page(&server, "about").await.is_empty());

    let response = server
        .post(
            &token,
            "/api/v1/site-content/sections",
            json!({
                "page_slug": "about",
                "section_key": "hero",
                "content": {"title": "About Us"}
            }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let section: Value = response.json().await.unwrap();
    let section_path = format!("/api/v1/site-content/sections/{}", section["id"]);

    let page = public_page(&server, "about").await;
    assert_eq!(page.len(), 1);
    assert_eq!(page[0]["content"]["title"], "About Us");

    server
        .put(&token, &section_path, json!({"content": {"title": "Our School"}}))
        .await;
    let page = public_page(&server, "about").await;
    assert_eq!(page[0]["content"]["title"], "Our School");

    // Hidden sections drop out of the public page but stay visible to admins
    server
        .put(&token, &section_path, json!({"is_active": false}))
        .await;
    assert!(public_page(&server, "about").await.is_empty());

    let response = server.get(&token, "/api/v1/site-content/pages/about").await;
    let all: Vec<Value> = response.json().await.unwrap();
    assert_eq!(all.len(), 1);

    assert_eq!(
        server.delete(&token, &section_path).await.status(),
        StatusCode::NO_CONTENT
    );
    assert_eq!(
        server.get(&token, &section_path).await.status(),
        StatusCode::NOT_FOUND
    );
}

#[tokio::test]
async fn test_sections_follow_order_index() {
    let server = cached_server().await;
    let token = server.principal_token();

    for (key, order) in [("cta", 2), ("hero", 0), ("stats", 1)] {
        server
            .post(
                &token,
                "/api/v1/site-content/sections",
                json!({"page_slug": "academics", "section_key": key, "order_index": order, "content": {}}),
            )
            .await;
    }

    let keys: Vec<String> = public_page(&server, "academics")
        .await
        .iter()
        .map(|s| s["section_key"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(keys, vec!["hero", "stats", "cta"]);

    let response = server
        .post(
            &token,
            "/api/v1/site-content/sections",
            json!({"page_slug": "academics", "section_key": "hero", "content": {}}),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_seed_replaces_page() {
    let server = cached_server().await;
    let token = server.principal_token();

    server
        .post(
            &token,
            "/api/v1/site-content/sections",
            json!({"page_slug": "footer", "section_key": "legacy", "content": {}}),
        )
        .await;
    assert_eq!(public_page(&server, "footer").await.len(), 1);

    let response = server
        .post(&token, "/api/v1/site-content/seed/footer", json!({}))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let report: Value = response.json().await.unwrap();
    let seeded = report["sections"].as_array().unwrap();
    assert!(!seeded.contains(&json!("legacy")));

    let page = public_page(&server, "footer").await;
    assert_eq!(page.len(), seeded.len());

    let pages: Vec<Value> = server
        .get(&token, "/api/v1/site-content/pages")
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(pages[0]["page_slug"], "footer");

    let response = server
        .post(&token, "/api/v1/site-content/seed/gallery", json!({}))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_content_admin_needs_permission() {
    let server = cached_server().await;
    let viewer = server
        .admin_with("viewer", "viewer-password", &[Permission::ViewDashboard])
        .await;
    let token = server.token_for(&viewer);

    let response = server.get(&token, "/api/v1/site-content/pages").await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(
        detail(response).await,
        "Permission denied. Required: manage_site_content"
    );

    let response = server
        .client
        .get(server.url("/api/v1/site-content/public/bad%20slug"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
