use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use org_chart::{DepartmentEngine, InMemoryRepository};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

fn test_app() -> Router {
    let engine = Arc::new(DepartmentEngine::new(InMemoryRepository::new()));
    org_chart::app(engine, Duration::from_secs(5))
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<&str>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if body.is_some() {
        builder = builder.header("content-type", "application/json");
    }
    let request = builder
        .body(body.map(|b| Body::from(b.to_string())).unwrap_or_else(Body::empty))
        .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
    };
    (status, value)
}

async fn create_department(app: &Router, body: Value) -> Value {
    let (status, json) = send(app, "POST", "/departments", Some(&body.to_string())).await;
    assert_eq!(status, StatusCode::CREATED, "unexpected body: {}", json);
    json
}

#[tokio::test]
async fn test_engineering_backend_scenario() {
    let app = test_app();

    let engineering = create_department(&app, json!({"name": "Engineering"})).await;
    assert_eq!(engineering["id"], 1);
    assert_eq!(engineering["parent_id"], Value::Null);

    let backend = create_department(&app, json!({"name": "Backend", "parent_id": 1})).await;
    assert_eq!(backend["id"], 2);
    assert_eq!(backend["parent_id"], 1);

    let (status, alice) = send(
        &app,
        "POST",
        "/departments/2/employees",
        Some(r#"{"full_name":"Alice","position":"Engineer","hired_at":"2024-01-15"}"#),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(alice["hired_at"], "2024-01-15");
    assert_eq!(alice["department_id"], 2);

    let (status, tree) = send(
        &app,
        "GET",
        "/departments/1?depth=1&include_employees=true",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    assert_eq!(tree["department"]["id"], 1);
    assert_eq!(tree["department"]["name"], "Engineering");
    assert_eq!(tree["department"]["parent_id"], Value::Null);
    assert_eq!(tree["employees"], json!([]));

    let children = tree["children"].as_array().unwrap();
    assert_eq!(children.len(), 1);
    let child = &children[0];
    assert_eq!(child["department"]["id"], 2);
    assert_eq!(child["department"]["name"], "Backend");
    assert_eq!(child["department"]["parent_id"], 1);
    assert_eq!(child["employees"][0]["full_name"], "Alice");
    assert_eq!(child["employees"][0]["hired_at"], "2024-01-15");
    assert_eq!(child["children"], json!([]));
}

#[tokio::test]
async fn test_get_defaults_to_one_level_with_employees() {
    let app = test_app();
    create_department(&app, json!({"name": "A"})).await;
    create_department(&app, json!({"name": "B", "parent_id": 1})).await;
    create_department(&app, json!({"name": "C", "parent_id": 2})).await;

    let (status, tree) = send(&app, "GET", "/departments/1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(tree["employees"], json!([]));
    assert_eq!(tree["children"][0]["department"]["name"], "B");
    assert_eq!(tree["children"][0]["children"], json!([]));

    let (_, tree) = send(&app, "GET", "/departments/1?include_employees=0", None).await;
    assert!(tree.get("employees").is_none());
}

#[tokio::test]
async fn test_get_query_validation() {
    let app = test_app();
    create_department(&app, json!({"name": "A"})).await;

    let cases = [
        ("/departments/1?depth=abc", "depth must be an integer"),
        ("/departments/1?depth=6", "depth must be between 0 and 5"),
        ("/departments/1?depth=-1", "depth must be between 0 and 5"),
        (
            "/departments/1?include_employees=maybe",
            "include_employees must be a boolean",
        ),
        ("/departments/abc", "invalid department id"),
        ("/departments/0", "invalid department id"),
    ];
    for (uri, message) in cases {
        let (status, body) = send(&app, "GET", uri, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", uri);
        assert_eq!(body["error"], message, "{}", uri);
    }

    let (status, body) = send(&app, "GET", "/departments/42", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "department not found");
}

#[tokio::test]
async fn test_create_rejects_bad_bodies() {
    let app = test_app();

    for body in [
        "not json",
        r#"{"name":"A","unexpected":true}"#,
        r#"{"name":"A"}{"name":"B"}"#,
        r#"{"name":"A","parent_id":-1}"#,
        "",
    ] {
        let (status, json) = send(&app, "POST", "/departments", Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", body);
        assert_eq!(json["error"], "invalid JSON body");
    }

    let (status, json) = send(&app, "POST", "/departments", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "invalid JSON body");

    for body in [r#"{"name":"   "}"#, r#"{"parent_id":1}"#] {
        let (status, json) = send(&app, "POST", "/departments", Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", body);
        assert_eq!(json["error"], "name length must be in range 1..200");
    }

    let root = create_department(&app, json!({"name": "Root"})).await;
    let uri = format!("/departments/{}", root["id"]);
    let (status, json) = send(&app, "PATCH", &uri, Some(r#"{"parent_id":-5}"#)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "invalid JSON body");

    let uri = format!("/departments/{}/employees", root["id"]);
    let (status, json) = send(&app, "POST", &uri, Some(r#"{"position":"Engineer"}"#)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "full_name length must be in range 1..200");
}

#[tokio::test]
async fn test_duplicate_sibling_name_is_conflict() {
    let app = test_app();
    create_department(&app, json!({"name": "Sales"})).await;

    let (status, json) = send(&app, "POST", "/departments", Some(r#"{"name":"sales"}"#)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(
        json["error"],
        "department name must be unique under the same parent"
    );
}

#[tokio::test]
async fn test_patch_parent_tri_state() {
    let app = test_app();
    create_department(&app, json!({"name": "A"})).await;
    create_department(&app, json!({"name": "B"})).await;
    create_department(&app, json!({"name": "C", "parent_id": 1})).await;

    // Absent parent_id: only the name changes.
    let (status, json) = send(&app, "PATCH", "/departments/3", Some(r#"{"name":"C2"}"#)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["name"], "C2");
    assert_eq!(json["parent_id"], 1);

    let (status, json) = send(&app, "PATCH", "/departments/3", Some(r#"{"parent_id":2}"#)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["parent_id"], 2);

    let (status, json) =
        send(&app, "PATCH", "/departments/3", Some(r#"{"parent_id":null}"#)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["parent_id"], Value::Null);

    let (status, json) = send(&app, "PATCH", "/departments/3", Some("{}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["name"], "C2");
}

#[tokio::test]
async fn test_patch_cycle_and_self_parent() {
    let app = test_app();
    create_department(&app, json!({"name": "A"})).await;
    create_department(&app, json!({"name": "B", "parent_id": 1})).await;

    let (status, json) = send(&app, "PATCH", "/departments/1", Some(r#"{"parent_id":2}"#)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["error"], "department cycle detected");

    let (status, json) = send(&app, "PATCH", "/departments/1", Some(r#"{"parent_id":1}"#)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "department cannot be parent of itself");
}

#[tokio::test]
async fn test_delete_cascade_and_reassign() {
    let app = test_app();
    create_department(&app, json!({"name": "Company"})).await; // 1
    create_department(&app, json!({"name": "Old", "parent_id": 1})).await; // 2
    create_department(&app, json!({"name": "Team", "parent_id": 2})).await; // 3
    create_department(&app, json!({"name": "New"})).await; // 4
    let (_, worker) = send(
        &app,
        "POST",
        "/departments/2/employees",
        Some(r#"{"full_name":"Worker","position":"Analyst"}"#),
    )
    .await;
    assert!(worker.get("hired_at").is_none());

    let (status, _) = send(
        &app,
        "DELETE",
        "/departments/2?mode=%20REASSIGN%20&reassign_to_department_id=4",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, new_dept) = send(&app, "GET", "/departments/4?depth=0", None).await;
    assert_eq!(new_dept["employees"][0]["full_name"], "Worker");
    let (_, team) = send(&app, "GET", "/departments/3?depth=0", None).await;
    assert_eq!(team["department"]["parent_id"], 1);

    let (status, _) = send(&app, "DELETE", "/departments/1?mode=cascade", None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(&app, "GET", "/departments/3", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_parameter_validation() {
    let app = test_app();
    create_department(&app, json!({"name": "A"})).await;

    let (status, json) = send(&app, "DELETE", "/departments/1", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "mode must be one of: cascade, reassign");

    let (status, json) = send(&app, "DELETE", "/departments/1?mode=reassign", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        json["error"],
        "reassign_to_department_id is required when mode=reassign"
    );

    let (status, json) = send(
        &app,
        "DELETE",
        "/departments/1?mode=reassign&reassign_to_department_id=x",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        json["error"],
        "reassign_to_department_id must be a positive integer"
    );

    let (status, _) = send(
        &app,
        "DELETE",
        "/departments/1?mode=reassign&reassign_to_department_id=9",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_employee_date_and_department_checks() {
    let app = test_app();
    create_department(&app, json!({"name": "A"})).await;

    let (status, json) = send(
        &app,
        "POST",
        "/departments/1/employees",
        Some(r#"{"full_name":"Bob","position":"Dev","hired_at":"15/01/2024"}"#),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "hired_at must be in YYYY-MM-DD format");

    let (status, json) = send(
        &app,
        "POST",
        "/departments/9/employees",
        Some(r#"{"full_name":"Bob","position":"Dev"}"#),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "department not found");
}

#[tokio::test]
async fn test_routing_fallbacks_and_healthcheck() {
    let app = test_app();

    let (status, json) = send(&app, "GET", "/teams", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "route not found");

    let (status, json) = send(&app, "PUT", "/departments/1", Some("{}")).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(json["error"], "method not allowed");

    let (status, json) = send(&app, "GET", "/departments", None).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(json["error"], "method not allowed");

    let (status, body) = send(&app, "GET", "/healthcheck", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::String("ok".to_string()));
}
