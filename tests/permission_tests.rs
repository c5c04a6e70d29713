//! Role and permission gate over the HTTP surface

mod common;

use common::detail;
use reqwest::StatusCode;
use schoolhouse::auth::Permission;
use serde_json::{json, Value};

#[tokio::test]
async fn test_principal_passes_every_gate() {
    let server = common::start().await;
    let token = server.principal_token();

    for path in [
        "/api/v1/students",
        "/api/v1/teachers",
        "/api/v1/classes",
        "/api/v1/exams",
        "/api/v1/applications",
        "/api/v1/contacts",
        "/api/v1/students/stats/summary",
        "/api/v1/exams/stats/summary",
        "/api/v1/site-content/pages",
        "/api/v1/admins",
    ] {
        let response = server.get(&token, path).await;
        assert_eq!(response.status(), StatusCode::OK, "GET {}", path);
    }
}

#[tokio::test]
async fn test_missing_permission_then_granted() {
    let server = common::start().await;
    let clerk = server
        .admin_with("clerk", "clerk-password", &[Permission::ViewStudents])
        .await;
    let token = server.token_for(&clerk);

    assert_eq!(
        server.get(&token, "/api/v1/students").await.status(),
        StatusCode::OK
    );

    let response = server
        .post(&token, "/api/v1/students", json!({"name": "K. Rao"}))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(
        detail(response).await,
        "Permission denied. Required: add_students"
    );

    let response = server
        .put(
            &server.principal_token(),
            &format!("/api/v1/admins/{}", clerk.id),
            json!({"permissions": ["view_students", "add_students"]}),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    // Permissions are read from the store on every request
    let response = server
        .post(&token, "/api/v1/students", json!({"name": "K. Rao"}))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn test_admin_management_is_principal_only() {
    let server = common::start().await;
    let manager = server
        .admin_with("manager", "manager-password", &Permission::ALL)
        .await;
    let token = server.token_for(&manager);

    let response = server.get(&token, "/api/v1/admins").await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(detail(response).await, "Principal access required");

    // The catalogue is open to any signed-in admin
    let response = server.get(&token, "/api/v1/admins/permissions").await;
    assert_eq!(response.status(), StatusCode::OK);
    let catalogue: Value = response.json().await.unwrap();
    assert!(catalogue["permissions"]
        .as_array()
        .unwrap()
        .contains(&json!("view_students")));
    assert!(catalogue["templates"].get("RECEPTIONIST").is_some());
}

#[tokio::test]
async fn test_create_admin_from_template() {
    let server = common::start().await;
    let token = server.principal_token();

    let response = server
        .post(
            &token,
            "/api/v1/admins",
            json!({
                "username": "frontdesk",
                "password": "frontdesk-pass",
                "role_template": "RECEPTIONIST"
            }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let admin: Value = response.json().await.unwrap();
    assert_eq!(admin["role"], "ADMIN");
    assert!(admin["permissions"]
        .as_array()
        .unwrap()
        .contains(&json!("view_applications")));

    let response = server
        .post(
            &token,
            "/api/v1/admins",
            json!({"username": "frontdesk", "password": "another-pass"}),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(detail(response).await, "Username already exists");
}

#[tokio::test]
async fn test_last_principal_is_protected() {
    let server = common::start().await;
    let token = server.principal_token();
    let own = format!("/api/v1/admins/{}", server.principal.id);

    let response = server.delete(&token, &own).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = server.put(&token, &own, json!({"role": "ADMIN"})).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // With a second principal the first can go
    let deputy = server
        .admin_with("deputy", "deputy-password", &[Permission::ViewDashboard])
        .await;
    let response = server
        .put(
            &token,
            &format!("/api/v1/admins/{}", deputy.id),
            json!({"role": "PRINCIPAL"}),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let promoted: Value = response.json().await.unwrap();
    assert_eq!(promoted["role"], "PRINCIPAL");

    let response = server.delete(&token, &own).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_public_submissions_need_no_token() {
    let server = common::start().await;

    let response = server
        .client
        .post(server.url("/api/v1/applications"))
        .json(&json!({"student_name": "M. Iyer", "grade_applying": "5"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let application: Value = response.json().await.unwrap();
    assert_eq!(application["status"], "pending");

    let response = server
        .client
        .post(server.url("/api/v1/contacts"))
        .json(&json!({"name": "S. Das", "message": "Bus routes?"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    // Reading them back is gated
    let receptionist = server
        .admin_with("desk", "desk-password", &[Permission::ViewContacts])
        .await;
    let token = server.token_for(&receptionist);
    assert_eq!(
        server.get(&token, "/api/v1/contacts").await.status(),
        StatusCode::OK
    );
    assert_eq!(
        server.get(&token, "/api/v1/applications").await.status(),
        StatusCode::FORBIDDEN
    );
}
