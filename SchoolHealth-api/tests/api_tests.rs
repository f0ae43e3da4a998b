use std::sync::Once;

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use school_health_api::{create_application, AppState};
use school_health_domain::database::create_in_memory_pool;
use school_health_domain::services::{create_default_services, AdminCredentials, BackupConfig};

const ADMIN_EMAIL: &str = "admin@school.test";
const ADMIN_PASSWORD: &str = "admin-password";

static INIT: Once = Once::new();

fn initialize() {
    INIT.call_once(|| {
        std::env::set_var("JWT_SECRET", "integration-test-secret");
    });
}

/// Fresh application over its own in-memory database
fn test_app() -> Router {
    initialize();

    let pool = create_in_memory_pool().expect("in-memory pool");
    let scratch = std::env::temp_dir().join(format!("school-health-test-{}", Uuid::new_v4()));
    let backups = BackupConfig { backup_dir: scratch.join("backups"), schedule_enabled: false };
    let admin = AdminCredentials { email: ADMIN_EMAIL.to_string(), password: ADMIN_PASSWORD.to_string() };

    let services = create_default_services(pool.clone(), Some(admin), backups);
    create_application(AppState::new(services, pool, scratch.join("uploads")))
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, axum::http::HeaderMap, Value) {
    let response = app.clone().oneshot(request).await.expect("request should be served");
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
    let body = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap_or(Value::Null) };
    (status, headers, body)
}

fn json_request(method: Method, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).expect("request")
}

fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(Method::GET).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::empty()).expect("request")
}

/// multipart/form-data body with text fields and an optional file part
fn multipart_request(uri: &str, token: &str, fields: &[(&str, &str)], file: Option<(&str, &str, &[u8])>) -> Request<Body> {
    let boundary = "school-health-test-boundary";
    let mut body = Vec::new();

    for (name, value) in fields {
        body.extend_from_slice(
            format!("--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n", boundary, name, value).as_bytes(),
        );
    }
    if let Some((name, file_name, bytes)) = file {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
                boundary, name, file_name
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", boundary).as_bytes());

    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={}", boundary))
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::from(body))
        .expect("request")
}

async fn admin_token(app: &Router) -> String {
    let (status, _, body) = send(
        app,
        json_request(
            Method::POST,
            "/api/admin/login",
            None,
            json!({ "email": ADMIN_EMAIL, "password": ADMIN_PASSWORD }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "admin login failed: {}", body);
    body["access_token"].as_str().expect("token").to_string()
}

/// Create a student through the admin endpoint, log them in and return (token, account id)
async fn register_student(app: &Router, email: &str, student_id: &str) -> (String, String) {
    let admin = admin_token(app).await;
    let (status, _, body) = send(
        app,
        multipart_request(
            "/api/admin/students",
            &admin,
            &[
                ("name", "Test Student"),
                ("email", email),
                ("password", "student-password"),
                ("cohort", "k47"),
                ("student_id", student_id),
                ("major", "Computer Science"),
            ],
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "student creation failed: {}", body);

    let (status, _, body) = send(
        app,
        json_request(
            Method::POST,
            "/api/user/login",
            None,
            json!({ "email": email, "password": "student-password" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "student login failed: {}", body);
    (
        body["access_token"].as_str().expect("token").to_string(),
        body["user"]["user_id"].as_str().expect("user id").to_string(),
    )
}

/// Self-register a plain user account and return its token
async fn register_user(app: &Router, email: &str, extra: Value) -> (StatusCode, Value) {
    let mut payload = json!({ "name": "Visitor", "email": email, "password": "visitor-password" });
    if let (Some(target), Some(fields)) = (payload.as_object_mut(), extra.as_object()) {
        target.extend(fields.clone());
    }
    let (status, _, body) = send(app, json_request(Method::POST, "/api/user/register", None, payload)).await;
    (status, body)
}

async fn doctor_token(app: &Router, admin: &str) -> String {
    let (status, _, body) = send(
        app,
        multipart_request(
            "/api/admin/doctors",
            admin,
            &[
                ("name", "Dr. Test"),
                ("email", "doctor@school.test"),
                ("password", "doctor-password"),
                ("speciality", "General physician"),
                ("degree", "MBBS"),
                ("experience", "4 Years"),
                ("fees", "50"),
                ("address", r#"{"line1":"Clinic","line2":"Building A"}"#),
            ],
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "doctor creation failed: {}", body);

    let (status, headers, body) = send(
        app,
        json_request(
            Method::POST,
            "/api/doctor/login",
            None,
            json!({ "email": "doctor@school.test", "password": "doctor-password" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "doctor login failed: {}", body);
    let cookie = headers.get(header::SET_COOKIE).and_then(|v| v.to_str().ok()).unwrap_or_default();
    assert!(cookie.starts_with("dToken="));
    body["access_token"].as_str().expect("token").to_string()
}

#[tokio::test]
async fn test_health_reports_degraded_for_in_memory_database() {
    let app = test_app();

    let (status, _, body) = send(&app, get("/health", None)).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["components"]["database"]["status"], "degraded");
    assert_eq!(body["components"]["api"]["status"], "ok");
}

#[tokio::test]
async fn test_admin_login_sets_cookie() {
    let app = test_app();

    let (status, headers, body) = send(
        &app,
        json_request(
            Method::POST,
            "/api/admin/login",
            None,
            json!({ "email": ADMIN_EMAIL, "password": ADMIN_PASSWORD }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["token_type"], "Bearer");
    assert_eq!(body["user"]["role"], "admin");
    let cookie = headers.get(header::SET_COOKIE).and_then(|v| v.to_str().ok()).unwrap_or_default();
    assert!(cookie.starts_with("aToken="));
    assert!(cookie.contains("HttpOnly"));
}

#[tokio::test]
async fn test_admin_login_rejects_wrong_password() {
    let app = test_app();

    let (status, _, body) = send(
        &app,
        json_request(Method::POST, "/api/admin/login", None, json!({ "email": ADMIN_EMAIL, "password": "nope" })),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthorized");
}

#[tokio::test]
async fn test_protected_routes_require_token() {
    let app = test_app();

    for uri in ["/api/admin/dashboard", "/api/doctor/drugs", "/api/user/profile", "/api/messages/conversations"] {
        let (status, _, _) = send(&app, get(uri, None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{} should require a token", uri);
    }
}

#[tokio::test]
async fn test_student_cannot_use_staff_routes() {
    let app = test_app();
    let (token, _) = register_student(&app, "roles@school.test", "SV100").await;

    for uri in ["/api/admin/dashboard", "/api/doctor/drugs", "/api/students"] {
        let (status, _, body) = send(&app, get(uri, Some(&token))).await;
        assert_eq!(status, StatusCode::FORBIDDEN, "{} should be staff only", uri);
        assert_eq!(body["error"], "forbidden");
    }
}

#[tokio::test]
async fn test_admin_sees_dashboard_and_student_directory() {
    let app = test_app();
    let admin = admin_token(&app).await;
    register_student(&app, "listed@school.test", "SV200").await;

    let (status, _, body) = send(&app, get("/api/admin/dashboard", Some(&admin))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["students"], 1);
    assert_eq!(body["doctors"], 0);

    let (status, _, body) = send(&app, get("/api/students?cohort=K47", Some(&admin))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn test_student_login_and_profile() {
    let app = test_app();
    register_student(&app, "profile@school.test", "SV300").await;

    let (status, headers, body) = send(
        &app,
        json_request(
            Method::POST,
            "/api/user/login",
            None,
            json!({ "email": "profile@school.test", "password": "student-password" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let cookie = headers.get(header::SET_COOKIE).and_then(|v| v.to_str().ok()).unwrap_or_default();
    assert!(cookie.starts_with("token="));
    let token = body["access_token"].as_str().expect("token").to_string();

    let (status, _, body) = send(&app, get("/api/user/profile", Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["student_id"], "SV300");
    assert_eq!(body["cohort"], "K47");
}

#[tokio::test]
async fn test_duplicate_registration_conflicts() {
    let app = test_app();
    register_student(&app, "twice@school.test", "SV400").await;

    let (status, _, body) = send(
        &app,
        json_request(
            Method::POST,
            "/api/user/register",
            None,
            json!({ "name": "Again", "email": "twice@school.test", "password": "another-password" }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "conflict");
}

#[tokio::test]
async fn test_students_only_read_their_own_records() {
    let app = test_app();
    let (token, _) = register_student(&app, "guard@school.test", "SV500").await;

    let (status, _, _) = send(&app, get("/api/user/physical/SV999", Some(&token))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _, _) = send(&app, get("/api/user/abnormalities/SV999", Some(&token))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _, body) = send(&app, get("/api/user/physical/SV500", Some(&token))).await;
    assert_eq!(status, StatusCode::NOT_FOUND, "own records are readable but empty: {}", body);
}

#[tokio::test]
async fn test_registered_users_cannot_read_student_records() {
    let app = test_app();
    register_student(&app, "owner@school.test", "SV999").await;

    let (status, body) = register_user(&app, "visitor@school.test", json!({})).await;
    assert_eq!(status, StatusCode::CREATED, "registration failed: {}", body);
    assert_eq!(body["user"]["role"], "user");
    let token = body["access_token"].as_str().expect("token").to_string();

    for path in ["physical", "abnormalities", "prescriptions", "health-scores", "exam-sessions"] {
        let (status, _, _) = send(&app, get(&format!("/api/user/{}/SV999", path), Some(&token))).await;
        assert_eq!(status, StatusCode::FORBIDDEN, "{} must be refused", path);
    }
}

#[tokio::test]
async fn test_registration_ignores_student_role_and_id() {
    let app = test_app();

    let (status, body) =
        register_user(&app, "claimer@school.test", json!({ "role": "student", "student_id": "SV998" })).await;
    assert_eq!(status, StatusCode::CREATED, "registration failed: {}", body);
    assert_eq!(body["user"]["role"], "user");
    assert!(body["user"]["student_id"].is_null());

    let token = body["access_token"].as_str().expect("token").to_string();
    let (status, _, _) = send(&app, get("/api/user/physical/SV998", Some(&token))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_locked_session_rejects_doctor_edits() {
    let app = test_app();
    let admin = admin_token(&app).await;
    let doctor = doctor_token(&app, &admin).await;

    let (status, _, session) = send(
        &app,
        json_request(
            Method::POST,
            "/api/admin/exam-sessions",
            Some(&admin),
            json!({ "name": "Spring exam", "date": "2026-03-01" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let session_id = session["id"].as_str().expect("session id").to_string();

    let (status, _, locked) = send(
        &app,
        json_request(
            Method::POST,
            &format!("/api/admin/exam-sessions/{}/lock", session_id),
            Some(&admin),
            json!({ "is_locked": true, "lock_reason": "Results finalized" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(locked["is_locked"], true);

    let (status, _, body) = send(
        &app,
        json_request(
            Method::POST,
            "/api/doctor/physical-fitness",
            Some(&doctor),
            json!({
                "exam_session_id": session_id,
                "student_id": "SV600",
                "follow_date": "2026-03-01",
                "height": 170.0,
                "weight": 60.0
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "locked");
    assert_eq!(body["message"], "Results finalized");

    let (status, _, permission) = send(
        &app,
        get(&format!("/api/doctor/exam-sessions/{}/permission", session_id), Some(&doctor)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(permission["can_edit"], false);

    let (status, _, request) = send(
        &app,
        json_request(
            Method::POST,
            "/api/doctor/edit-requests",
            Some(&doctor),
            json!({ "exam_session_id": session_id, "reason": "Late measurements" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(request["requested_by_name"], "Dr. Test");
    assert_eq!(request["status"], "pending");

    let (status, _, reviewed) = send(
        &app,
        json_request(
            Method::POST,
            &format!("/api/admin/edit-requests/{}/review", request["id"].as_str().expect("request id")),
            Some(&admin),
            json!({ "action": "approve", "temp_unlock_hours": 2 }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reviewed["status"], "approved");

    let (status, _, permission) = send(
        &app,
        get(&format!("/api/doctor/exam-sessions/{}/permission", session_id), Some(&doctor)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(permission["can_edit"], true);
}

#[tokio::test]
async fn test_edit_request_status_filter_is_validated() {
    let app = test_app();
    let admin = admin_token(&app).await;

    let (status, _, body) = send(&app, get("/api/admin/edit-requests?status=bogus", Some(&admin))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "bad_request");

    let (status, _, body) = send(&app, get("/api/admin/edit-requests?status=pending", Some(&admin))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().map(Vec::len), Some(0));
}

#[tokio::test]
async fn test_drug_import_reports_invalid_rows() {
    let app = test_app();
    let admin = admin_token(&app).await;
    let doctor = doctor_token(&app, &admin).await;

    let csv = b"drugName,drugCode,drugType,drugUnit,inventoryQuantity,expiryDate\n\
Paracetamol,PARA500,tablet,box,20,2027-01-01\n\
Ibuprofen,,tablet,box,10,2027-01-01\n";
    let (status, _, body) = send(
        &app,
        multipart_request("/api/doctor/drugs/import", &doctor, &[], Some(("file", "drugs.csv", csv))),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_import");
    let invalid = body["details"]["invalid_rows"].as_array().expect("invalid rows");
    assert_eq!(invalid.len(), 1);
    assert!(invalid[0]["missing_fields"]
        .as_array()
        .map(|fields| fields.iter().any(|f| f == "drugCode"))
        .unwrap_or(false));

    let (status, _, drugs) = send(&app, get("/api/doctor/drugs", Some(&doctor))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(drugs.as_array().map(Vec::len), Some(0), "nothing is written when a row is invalid");
}

#[tokio::test]
async fn test_import_without_file_is_bad_request() {
    let app = test_app();
    let admin = admin_token(&app).await;

    let (status, _, body) = send(&app, multipart_request("/api/admin/students/import", &admin, &[("note", "no file attached")], None)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "bad_request");
}

#[tokio::test]
async fn test_messages_between_users() {
    let app = test_app();
    let (alice, alice_id) = register_student(&app, "alice@school.test", "SV700").await;
    let (bob, bob_id) = register_student(&app, "bob@school.test", "SV701").await;

    let (status, _, message) = send(
        &app,
        json_request(
            Method::POST,
            &format!("/api/messages/send/{}", bob_id),
            Some(&alice),
            json!({ "content": "Hello Bob" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(message["sender_id"], alice_id.as_str());

    let (status, _, thread) = send(&app, get(&format!("/api/messages/{}", alice_id), Some(&bob))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(thread.as_array().map(Vec::len), Some(1));
    assert_eq!(thread[0]["content"], "Hello Bob");

    let (status, _, conversations) = send(&app, get("/api/messages/conversations", Some(&alice))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(conversations[0]["other_participant"], bob_id.as_str());

    let (status, _, _) = send(
        &app,
        json_request(
            Method::POST,
            &format!("/api/messages/send/{}", alice_id),
            Some(&alice),
            json!({ "content": "Talking to myself" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_logout_revokes_token() {
    let app = test_app();
    let (token, _) = register_student(&app, "logout@school.test", "SV800").await;

    let (status, headers, _) = send(&app, json_request(Method::POST, "/api/auth/logout", Some(&token), json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    let cookie = headers.get(header::SET_COOKIE).and_then(|v| v.to_str().ok()).unwrap_or_default();
    assert!(cookie.starts_with("token=;"));
    assert!(cookie.contains("Max-Age=0"));

    let (status, _, _) = send(&app, get("/api/user/profile", Some(&token))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_public_doctor_list_hides_unavailable_doctors() {
    let app = test_app();
    let admin = admin_token(&app).await;
    doctor_token(&app, &admin).await;

    let (status, _, doctors) = send(&app, get("/api/doctor/list", None)).await;
    assert_eq!(status, StatusCode::OK);
    let doctor_id = doctors[0]["id"].as_str().expect("doctor id").to_string();

    let (status, _, toggled) = send(
        &app,
        json_request(
            Method::POST,
            &format!("/api/admin/doctors/{}/availability", doctor_id),
            Some(&admin),
            json!({}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(toggled["available"], false);

    let (_, _, doctors) = send(&app, get("/api/doctor/list", None)).await;
    assert_eq!(doctors.as_array().map(Vec::len), Some(0));
}
