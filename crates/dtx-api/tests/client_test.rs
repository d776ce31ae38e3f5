//! Integration tests for the Dynatrace client against an in-process mock backend.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use chrono::{TimeZone, Utc};
use dtx_api::{
    ApiError, ClientConfig, CreateMaintenanceWindowRequest, DynatraceClient, EntitiesApi,
    EventIngest, EventsApi, MaintenanceWindow, MaintenanceWindowApi,
    MaintenanceWindowGeneralProperties, MaintenanceWindowOnceRecurrence,
    MaintenanceWindowSchedule, ProblemsApi,
};

// ==================== Mock Backend ====================

#[derive(Debug, Clone, Default)]
struct Captured {
    method: String,
    path: String,
    query: HashMap<String, String>,
    authorization: String,
    content_type: String,
    body: String,
}

type Responder = fn(&Method, &str) -> (StatusCode, &'static str);

#[derive(Clone)]
struct MockState {
    requests: Arc<Mutex<Vec<Captured>>>,
    responder: Responder,
}

async fn record(
    State(state): State<MockState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, &'static str) {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string()
    };
    let query = reqwest::Url::parse(&format!("http://mock/?{}", uri.query().unwrap_or_default()))
        .unwrap()
        .query_pairs()
        .into_owned()
        .collect();

    state.requests.lock().unwrap().push(Captured {
        method: method.to_string(),
        path: uri.path().to_string(),
        query,
        authorization: header("authorization"),
        content_type: header("content-type"),
        body: String::from_utf8_lossy(&body).into_owned(),
    });

    (state.responder)(&method, uri.path())
}

fn dynatrace(method: &Method, path: &str) -> (StatusCode, &'static str) {
    match (method.as_str(), path) {
        ("POST", "/api/v2/events/ingest") => (
            StatusCode::CREATED,
            r#"{"eventIngestResults":[{"correlationId":"corr-1","status":"OK"}],"reportCount":1}"#,
        ),
        ("GET", "/api/v2/entities") => (
            StatusCode::OK,
            r#"{"entities":[{"entityId":"HOST-1","displayName":"host-1","type":"HOST"}]}"#,
        ),
        ("POST", "/api/v2/settings/objects") => {
            (StatusCode::OK, r#"[{"code":200,"objectId":"mw-123"}]"#)
        }
        ("DELETE", "/api/v2/settings/objects/mw-123") => (StatusCode::NO_CONTENT, ""),
        ("GET", "/api/v2/problems") => (
            StatusCode::OK,
            r#"{"totalCount":1,"problems":[{"problemId":"p1","displayId":"P-1","title":"CPU saturation"}]}"#,
        ),
        _ => (StatusCode::BAD_REQUEST, ""),
    }
}

fn teapot(_: &Method, _: &str) -> (StatusCode, &'static str) {
    (StatusCode::IM_A_TEAPOT, r#"{"oops":true}"#)
}

fn rejected_object(_: &Method, _: &str) -> (StatusCode, &'static str) {
    (StatusCode::OK, r#"[{"code":400,"objectId":""}]"#)
}

fn object_instead_of_array(_: &Method, _: &str) -> (StatusCode, &'static str) {
    (StatusCode::OK, r#"{"code":418}"#)
}

async fn spawn_backend(responder: Responder) -> (DynatraceClient, Arc<Mutex<Vec<Captured>>>) {
    let requests = Arc::new(Mutex::new(Vec::new()));
    let state = MockState {
        requests: Arc::clone(&requests),
        responder,
    };
    let app = Router::new().fallback(record).with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let client =
        DynatraceClient::new(ClientConfig::new(format!("http://{addr}/api"), "XYZ")).unwrap();
    (client, requests)
}

fn last_request(requests: &Arc<Mutex<Vec<Captured>>>) -> Captured {
    requests.lock().unwrap().last().cloned().unwrap()
}

fn window_request() -> CreateMaintenanceWindowRequest {
    CreateMaintenanceWindowRequest::environment(MaintenanceWindow {
        enabled: true,
        general_properties: MaintenanceWindowGeneralProperties {
            name: "Steadybit".to_string(),
            description: String::new(),
            maintenance_type: "PLANNED".to_string(),
            suppression: "DETECT_PROBLEMS_AND_ALERT".to_string(),
            disable_synthetic_monitor_execution: false,
        },
        schedule: MaintenanceWindowSchedule {
            schedule_type: "ONCE".to_string(),
            once_recurrence: MaintenanceWindowOnceRecurrence {
                start_time: "2024-01-01T10:00:00".to_string(),
                end_time: "2024-01-01T10:05:00".to_string(),
                time_zone: "UTC".to_string(),
            },
        },
    })
}

// ==================== Request Shape Tests ====================

#[tokio::test]
async fn test_requests_carry_token_and_content_type() {
    let (client, requests) = spawn_backend(dynatrace).await;

    let event = EventIngest::custom_info("hello", Default::default());
    client.post_event(&event).await.unwrap();

    let request = last_request(&requests);
    assert_eq!(request.authorization, "Api-Token XYZ");
    assert_eq!(request.content_type, "application/json; charset=UTF-8");
    assert!(request.body.contains(r#""title":"hello""#));
}

// ==================== Events ====================

#[tokio::test]
async fn test_post_event_success() {
    let (client, requests) = spawn_backend(dynatrace).await;

    let event = EventIngest::custom_info("hello", Default::default()).at(1_000);
    let results = client.post_event(&event).await.unwrap();

    assert_eq!(results.event_ingest_results.len(), 1);
    assert_eq!(results.event_ingest_results[0].correlation_id, "corr-1");
    assert_eq!(results.report_count, 1);
    assert_eq!(last_request(&requests).path, "/api/v2/events/ingest");
}

#[tokio::test]
async fn test_post_event_unexpected_status() {
    let (client, _) = spawn_backend(teapot).await;

    let event = EventIngest::custom_info("hello", Default::default());
    let err = client.post_event(&event).await.unwrap_err();

    assert!(matches!(err, ApiError::UnexpectedStatus { status: 418, .. }));
}

// ==================== Entities ====================

#[tokio::test]
async fn test_get_entities_encodes_selector() {
    let (client, requests) = spawn_backend(dynatrace).await;
    let selector = r#"type("HOST"),entityName.equals("host-1")"#;

    let entities = client.get_entities(selector).await.unwrap();

    assert_eq!(entities.entities.len(), 1);
    assert_eq!(entities.entities[0].entity_id, "HOST-1");
    let request = last_request(&requests);
    assert_eq!(request.path, "/api/v2/entities");
    assert_eq!(request.query["entitySelector"], selector);
}

// ==================== Maintenance Windows ====================

#[tokio::test]
async fn test_create_maintenance_window_success() {
    let (client, requests) = spawn_backend(dynatrace).await;

    let id = client
        .create_maintenance_window(&window_request())
        .await
        .unwrap();

    assert_eq!(id, "mw-123");
    let request = last_request(&requests);
    let body: serde_json::Value = serde_json::from_str(&request.body).unwrap();
    assert!(body.is_array());
    assert_eq!(body[0]["schemaId"], "builtin:alerting.maintenance-window");
}

#[tokio::test]
async fn test_create_maintenance_window_non_200() {
    let (client, _) = spawn_backend(teapot).await;

    let err = client
        .create_maintenance_window(&window_request())
        .await
        .unwrap_err();

    assert!(matches!(err, ApiError::UnexpectedStatus { status: 418, .. }));
}

#[tokio::test]
async fn test_create_maintenance_window_rejected_object() {
    let (client, _) = spawn_backend(rejected_object).await;

    let err = client
        .create_maintenance_window(&window_request())
        .await
        .unwrap_err();

    assert!(matches!(err, ApiError::UnexpectedResponse { .. }));
}

#[tokio::test]
async fn test_create_maintenance_window_wrong_shape() {
    let (client, _) = spawn_backend(object_instead_of_array).await;

    let err = client
        .create_maintenance_window(&window_request())
        .await
        .unwrap_err();

    assert!(matches!(err, ApiError::Serialization(_)));
}

#[tokio::test]
async fn test_delete_maintenance_window_success() {
    let (client, requests) = spawn_backend(dynatrace).await;

    client.delete_maintenance_window("mw-123").await.unwrap();

    let request = last_request(&requests);
    assert_eq!(request.method, "DELETE");
    assert_eq!(request.path, "/api/v2/settings/objects/mw-123");
}

#[tokio::test]
async fn test_delete_maintenance_window_failure() {
    let (client, _) = spawn_backend(teapot).await;

    let err = client.delete_maintenance_window("mw-123").await.unwrap_err();
    assert!(matches!(err, ApiError::UnexpectedStatus { status: 418, .. }));
}

// ==================== Problems ====================

#[tokio::test]
async fn test_get_problems_query() {
    let (client, requests) = spawn_backend(dynatrace).await;
    let from = Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap();

    let problems = client
        .get_problems(from, Some(r#"type("CLOUD_APPLICATION")"#))
        .await
        .unwrap();

    assert_eq!(problems.len(), 1);
    assert_eq!(problems[0].display_id, "P-1");

    let request = last_request(&requests);
    assert_eq!(request.path, "/api/v2/problems");
    assert_eq!(request.query["problemSelector"], r#"status("OPEN")"#);
    assert_eq!(request.query["pageSize"], "500");
    assert_eq!(request.query["from"], from.timestamp_millis().to_string());
    assert_eq!(
        request.query["entitySelector"],
        r#"type("CLOUD_APPLICATION")"#
    );
}

#[tokio::test]
async fn test_get_problems_without_selector() {
    let (client, requests) = spawn_backend(dynatrace).await;

    client.get_problems(Utc::now(), None).await.unwrap();

    assert!(!last_request(&requests).query.contains_key("entitySelector"));
}

#[tokio::test]
async fn test_get_problems_unexpected_status() {
    let (client, _) = spawn_backend(teapot).await;

    let err = client.get_problems(Utc::now(), None).await.unwrap_err();
    assert!(matches!(err, ApiError::UnexpectedStatus { status: 418, .. }));
}

// ==================== Transport ====================

#[tokio::test]
async fn test_transport_error_when_backend_unreachable() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client =
        DynatraceClient::new(ClientConfig::new(format!("http://{addr}/api"), "XYZ")).unwrap();
    let err = client.get_problems(Utc::now(), None).await.unwrap_err();

    assert!(matches!(err, ApiError::Transport { .. }));
}
