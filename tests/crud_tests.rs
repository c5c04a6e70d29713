//! Entity CRUD over the API with realistic payloads

mod common;

use common::{detail, TestServer};
use reqwest::StatusCode;
use serde_json::{json, Value};

async fn create(server: &TestServer, path: &str, body: Value) -> Value {
    let response = server.post(&server.principal_token(), path, body).await;
    assert_eq!(response.status(), StatusCode::CREATED, "POST {}", path);
    response.json().await.unwrap()
}

async fn fetch(server: &TestServer, path: &str) -> Value {
    let response = server.get(&server.principal_token(), path).await;
    assert_eq!(response.status(), StatusCode::OK, "GET {}", path);
    response.json().await.unwrap()
}

#[tokio::test]
async fn test_teacher_class_student_scenario() {
    let server = common::start().await;
    let token = server.principal_token();

    let teacher = create(
        &server,
        "/api/v1/teachers",
        json!({"name": "A. Rao", "department": "Mathematics", "gender": "Female"}),
    )
    .await;
    let teacher_id = teacher["id"].as_i64().unwrap();
    assert!(teacher["employee_id"].as_str().unwrap().starts_with("EMP"));

    let class = create(
        &server,
        "/api/v1/classes",
        json!({"class_name": "5-A", "grade": "5", "section": "A", "class_teacher_id": teacher_id}),
    )
    .await;
    let class_id = class["id"].as_i64().unwrap();
    assert_eq!(class["class_teacher_name"], "A. Rao");

    let student = create(
        &server,
        "/api/v1/students",
        json!({"name": "K. Rao", "class_id": class_id, "gender": "male"}),
    )
    .await;
    let student_path = format!("/api/v1/students/{}", student["id"]);

    let student = fetch(&server, &student_path).await;
    assert_eq!(student["class_name"], "5-A");

    let teacher = fetch(&server, &format!("/api/v1/teachers/{}", teacher_id)).await;
    assert_eq!(teacher["assigned_class_names"], json!(["5-A"]));

    let class = fetch(&server, &format!("/api/v1/classes/{}", class_id)).await;
    assert_eq!(class["student_count"], 1);

    let response = server
        .delete(&token, &format!("/api/v1/teachers/{}", teacher_id))
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let class = fetch(&server, &format!("/api/v1/classes/{}", class_id)).await;
    assert_eq!(class["class_name"], "5-A");
    assert!(class["class_teacher_id"].is_null());
    assert!(class["class_teacher_name"].is_null());

    let stats = fetch(&server, "/api/v1/classes/stats/summary").await;
    assert_eq!(stats["without_teacher"], 1);

    // The student still belongs to the class
    let student = fetch(&server, &student_path).await;
    assert_eq!(student["class_name"], "5-A");
}

#[tokio::test]
async fn test_partial_update_keeps_other_fields() {
    let server = common::start().await;
    let token = server.principal_token();

    let student = create(
        &server,
        "/api/v1/students",
        json!({"name": "P. Nair", "phone": "555-0101", "email": "p@example.com"}),
    )
    .await;
    let path = format!("/api/v1/students/{}", student["id"]);

    let response = server.put(&token, &path, json!({"phone": "555-0199"})).await;
    assert_eq!(response.status(), StatusCode::OK);

    let updated = fetch(&server, &path).await;
    assert_eq!(updated["phone"], "555-0199");
    assert_eq!(updated["email"], "p@example.com");
    assert_eq!(updated["name"], "P. Nair");
    assert_eq!(updated["student_id"], student["student_id"]);

    // Explicit null clears a nullable field
    server.put(&token, &path, json!({"email": null})).await;
    let cleared = fetch(&server, &path).await;
    assert!(cleared["email"].is_null());
    assert_eq!(cleared["phone"], "555-0199");
}

#[tokio::test]
async fn test_references_must_exist() {
    let server = common::start().await;

    let response = server
        .post(
            &server.principal_token(),
            "/api/v1/students",
            json!({"name": "Ghost", "class_id": 999}),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = server
        .post(
            &server.principal_token(),
            "/api/v1/classes",
            json!({"class_name": "6-B", "class_teacher_id": 999}),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_duplicate_class_name() {
    let server = common::start().await;
    create(&server, "/api/v1/classes", json!({"class_name": "7-C"})).await;

    let response = server
        .post(
            &server.principal_token(),
            "/api/v1/classes",
            json!({"class_name": "7-C"}),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(detail(response).await, "Class name already exists");
}

#[tokio::test]
async fn test_list_filters_and_pagination() {
    let server = common::start().await;
    let token = server.principal_token();

    for name in ["Anil Kumar", "Bina Shah", "Chitra Kumar"] {
        create(&server, "/api/v1/students", json!({"name": name})).await;
    }

    let found: Vec<Value> = fetch(&server, "/api/v1/students?search=kumar")
        .await
        .as_array()
        .unwrap()
        .clone();
    assert_eq!(found.len(), 2);

    let page = fetch(&server, "/api/v1/students?limit=1&offset=1").await;
    assert_eq!(page.as_array().unwrap().len(), 1);
    assert_eq!(page[0]["name"], "Bina Shah");

    let response = server.get(&token, "/api/v1/students?limit=500").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = server.get(&token, "/api/v1/students?offset=-1").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = server.get(&token, "/api/v1/students?is_active=maybe").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_student_stats() {
    let server = common::start().await;
    let token = server.principal_token();

    create(&server, "/api/v1/students", json!({"name": "A", "gender": "Male"})).await;
    create(&server, "/api/v1/students", json!({"name": "B", "gender": "female"})).await;
    let c = create(&server, "/api/v1/students", json!({"name": "C", "gender": "MALE"})).await;

    server
        .put(
            &token,
            &format!("/api/v1/students/{}", c["id"]),
            json!({"is_active": false}),
        )
        .await;

    let stats = fetch(&server, "/api/v1/students/stats/summary").await;
    assert_eq!(
        stats,
        json!({"total": 3, "active": 2, "inactive": 1, "male": 2, "female": 1})
    );
}

#[tokio::test]
async fn test_exam_lifecycle() {
    let server = common::start().await;
    let token = server.principal_token();

    let exam = create(
        &server,
        "/api/v1/exams",
        json!({
            "subject": "Mathematics",
            "grade": "5",
            "academic_year": "2025-2026",
            "exam_date": "2026-03-10",
            "start_time": "09:30:45",
            "status": "Scheduled"
        }),
    )
    .await;
    assert_eq!(exam["start_time"], "09:30:00");

    create(
        &server,
        "/api/v1/exams",
        json!({"subject": "Science", "academic_year": "2025-2026", "status": "Draft"}),
    )
    .await;
    create(
        &server,
        "/api/v1/exams",
        json!({"subject": "History", "academic_year": "2024-2025", "exam_date": "2025-03-01"}),
    )
    .await;

    // Dated exams newest first, undated last
    let exams = fetch(&server, "/api/v1/exams").await;
    let subjects: Vec<&str> = exams
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["subject"].as_str().unwrap())
        .collect();
    assert_eq!(subjects, vec!["Mathematics", "History", "Science"]);

    let stats = fetch(&server, "/api/v1/exams/stats/summary?academic_year=2025-2026").await;
    assert_eq!(stats["total"], 2);
    assert_eq!(stats["scheduled"], 1);

    let path = format!("/api/v1/exams/{}", exam["id"].as_str().unwrap());
    let response = server.put(&token, &path, json!({"status": "Completed"})).await;
    let updated: Value = response.json().await.unwrap();
    assert_eq!(updated["status"], "Completed");
    assert_eq!(updated["subject"], "Mathematics");

    assert_eq!(
        server.delete(&token, &path).await.status(),
        StatusCode::NO_CONTENT
    );
    let response = server.get(&token, &path).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(detail(response).await, "Exam not found");
}

#[tokio::test]
async fn test_application_review() {
    let server = common::start().await;
    let token = server.principal_token();

    let application = create(
        &server,
        "/api/v1/applications",
        json!({"student_name": "R. Menon", "parent_name": "V. Menon"}),
    )
    .await;
    let path = format!("/api/v1/applications/{}", application["id"].as_str().unwrap());

    let response = server
        .put(&token, &path, json!({"status": "approved", "notes": "Interview done"}))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let approved = fetch(&server, "/api/v1/applications?status=approved").await;
    assert_eq!(approved.as_array().unwrap().len(), 1);
    assert_eq!(approved[0]["parent_name"], "V. Menon");

    let stats = fetch(&server, "/api/v1/applications/stats/summary").await;
    assert_eq!(
        stats,
        json!({"total": 1, "pending": 0, "approved": 1, "rejected": 0})
    );
}

#[tokio::test]
async fn test_malformed_body_and_unknown_route() {
    let server = common::start().await;

    let response = server
        .client
        .post(server.url("/api/v1/students"))
        .bearer_auth(server.principal_token())
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(!detail(response).await.is_empty());

    let response = server.get(&server.principal_token(), "/api/v1/nowhere").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
