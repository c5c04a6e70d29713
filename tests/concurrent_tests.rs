//! Concurrent requests against one server

mod common;

use std::collections::HashSet;

use reqwest::StatusCode;
use schoolhouse::auth::Permission;
use serde_json::{json, Value};

#[tokio::test]
async fn test_concurrent_creates_get_distinct_ids() {
    let server = std::sync::Arc::new(common::start().await);
    let token = server.principal_token();

    let mut handles = Vec::new();
    for i in 0..20 {
        let server = server.clone();
        let token = token.clone();
        handles.push(tokio::spawn(async move {
            let response = server
                .post(&token, "/api/v1/students", json!({"name": format!("Student {}", i)}))
                .await;
            assert_eq!(response.status(), StatusCode::CREATED);
            let student: Value = response.json().await.unwrap();
            student["student_id"].as_str().unwrap().to_string()
        }));
    }

    let mut ids = HashSet::new();
    for handle in handles {
        ids.insert(handle.await.unwrap());
    }
    assert_eq!(ids.len(), 20);
}

#[tokio::test]
async fn test_racing_principal_deletes_keep_one() {
    let server = std::sync::Arc::new(common::start().await);
    let token = server.principal_token();

    let deputy = server
        .admin_with("deputy", "deputy-password", &[Permission::ViewDashboard])
        .await;
    server
        .put(
            &token,
            &format!("/api/v1/admins/{}", deputy.id),
            json!({"role": "PRINCIPAL"}),
        )
        .await;

    let first = {
        let server = server.clone();
        let token = token.clone();
        let path = format!("/api/v1/admins/{}", server.principal.id);
        tokio::spawn(async move { server.delete(&token, &path).await.status() })
    };
    let second = {
        let server = server.clone();
        let token = token.clone();
        let path = format!("/api/v1/admins/{}", deputy.id);
        tokio::spawn(async move { server.delete(&token, &path).await.status() })
    };

    let statuses = [first.await.unwrap(), second.await.unwrap()];
    let deleted = statuses
        .iter()
        .filter(|s| **s == StatusCode::NO_CONTENT)
        .count();
    assert!(deleted <= 1, "both principals deleted: {:?}", statuses);

    let remaining = server.state.store.list_admins().await.unwrap();
    assert!(remaining.iter().any(|a| a.role.is_principal()));
}

#[tokio::test]
async fn test_concurrent_public_reads_while_writing() {
    let mut config = common::test_config();
    config.content.cache_enabled = true;
    let server = std::sync::Arc::new(common::start_with(config).await);
    let token = server.principal_token();

    let mut readers = Vec::new();
    for _ in 0..10 {
        let server = server.clone();
        readers.push(tokio::spawn(async move {
            server
                .client
                .get(server.url("/api/v1/site-content/public/header"))
                .send()
                .await
                .unwrap()
                .status()
        }));
    }

    let response = server
        .post(
            &token,
            "/api/v1/site-content/sections",
            json!({"page_slug": "header", "section_key": "nav", "content": {"links": []}}),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    for reader in readers {
        assert_eq!(reader.await.unwrap(), StatusCode::OK);
    }

    // Whatever the readers cached before the write, the next read sees it
    let page: Vec<Value> = server
        .client
        .get(server.url("/api/v1/site-content/public/header"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(page.len(), 1);
}
