//! `FirestoreMetadataStore` against a mock Firestore REST endpoint.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use chrono::{TimeZone, Utc};
use photo_relay::{
    config::MetadataConfig,
    models::photo::PhotoRecord,
    services::metadata_store::{FirestoreMetadataStore, MetadataError, MetadataStore},
};
use serde_json::{Value, json};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

const API_KEY: &str = "test-api-key";

type Documents = Arc<Mutex<HashMap<String, Value>>>;

async fn create_document(
    State(docs): State<Documents>,
    Path((project, database)): Path<(String, String)>,
    Query(params): Query<HashMap<String, String>>,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    assert_eq!(project, "event-app");
    assert_eq!(database, "(default)");
    if params.get("key").map(String::as_str) != Some(API_KEY) {
        return (StatusCode::FORBIDDEN, Json(json!({ "error": "bad key" })));
    }
    let Some(id) = params.get("documentId").cloned() else {
        return (StatusCode::BAD_REQUEST, Json(json!({ "error": "no id" })));
    };

    let mut docs = docs.lock().unwrap();
    if docs.contains_key(&id) {
        return (StatusCode::CONFLICT, Json(json!({ "error": "ALREADY_EXISTS" })));
    }
    let document = json!({
        "name": format!("projects/{project}/databases/{database}/documents/photos/{id}"),
        "fields": body["fields"].clone(),
        "createTime": "2024-05-01T12:30:00.000000Z",
        "updateTime": "2024-05-01T12:30:00.000000Z"
    });
    docs.insert(id, document.clone());
    (StatusCode::OK, Json(document))
}

async fn get_document(
    State(docs): State<Documents>,
    Path((_project, _database, id)): Path<(String, String, String)>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    if params.get("key").map(String::as_str) != Some(API_KEY) {
        return (StatusCode::FORBIDDEN, Json(json!({ "error": "bad key" })));
    }
    match docs.lock().unwrap().get(&id) {
        Some(document) => (StatusCode::OK, Json(document.clone())),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": { "code": 404, "status": "NOT_FOUND" } })),
        ),
    }
}

/// Collection listing, which a lookup must never reach.
async fn list_documents(State(docs): State<Documents>) -> impl IntoResponse {
    let documents: Vec<Value> = docs.lock().unwrap().values().cloned().collect();
    Json(json!({ "documents": documents }))
}

async fn spawn_mock_firestore(docs: Documents) -> String {
    let app = Router::new()
        .route(
            "/v1/projects/{project}/databases/{database}/documents/photos",
            post(create_document).get(list_documents),
        )
        .route(
            "/v1/projects/{project}/databases/{database}/documents/photos/{id}",
            get(get_document),
        )
        .with_state(docs);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://127.0.0.1:{port}/v1")
}

fn store(endpoint: &str, api_key: &str) -> FirestoreMetadataStore {
    FirestoreMetadataStore::new(&MetadataConfig {
        project_id: "event-app".into(),
        api_key: api_key.into(),
        endpoint: endpoint.into(),
    })
    .unwrap()
}

fn sample_record() -> PhotoRecord {
    PhotoRecord {
        id: "7d1e0c1a-0000-4000-8000-000000000001".into(),
        storage_key: Some("events/evt1/photos/7d1e0c1a-0000-4000-8000-000000000001.jpg".into()),
        url: "https://photos.example.com/events/evt1/photos/7d1e0c1a-0000-4000-8000-000000000001.jpg"
            .into(),
        event_id: "evt1".into(),
        file_name: "pic.jpg".into(),
        size: 4096,
        content_type: Some("image/jpeg".into()),
        uploaded_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap(),
    }
}

#[tokio::test]
async fn create_then_get_returns_same_record() {
    let docs = Documents::default();
    let endpoint = spawn_mock_firestore(docs.clone()).await;
    let store = store(&endpoint, API_KEY);
    let record = sample_record();

    store.create_photo(&record).await.unwrap();

    let stored = docs.lock().unwrap().get(&record.id).cloned().unwrap();
    assert_eq!(stored["fields"]["eventId"]["stringValue"], "evt1");
    assert_eq!(stored["fields"]["size"]["integerValue"], "4096");

    let fetched = store.get_photo(&record.id).await.unwrap();
    assert_eq!(fetched, Some(record));
}

#[tokio::test]
async fn missing_document_is_none() {
    let endpoint = spawn_mock_firestore(Documents::default()).await;
    let store = store(&endpoint, API_KEY);

    assert_eq!(store.get_photo("nope").await.unwrap(), None);
}

#[tokio::test]
async fn legacy_document_decodes_without_storage_key() {
    let docs = Documents::default();
    docs.lock().unwrap().insert(
        "legacy-1".into(),
        json!({
            "name": "projects/event-app/databases/(default)/documents/photos/legacy-1",
            "fields": {
                "eventId": { "stringValue": "evt0" },
                "fileName": { "stringValue": "old.png" },
                "url": { "stringValue": "https://legacy.example.com/old.png" }
            },
            "createTime": "2023-01-02T03:04:05Z"
        }),
    );
    let endpoint = spawn_mock_firestore(docs).await;

    let record = store(&endpoint, API_KEY)
        .get_photo("legacy-1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.storage_key, None);
    assert_eq!(record.file_name, "old.png");
    assert_eq!(
        record.uploaded_at,
        Utc.with_ymd_and_hms(2023, 1, 2, 3, 4, 5).unwrap()
    );
}

#[tokio::test]
async fn error_statuses_surface_as_errors() {
    let endpoint = spawn_mock_firestore(Documents::default()).await;
    let store = store(&endpoint, "wrong-key");

    let err = store.get_photo("any").await.unwrap_err();
    assert!(matches!(err, MetadataError::Status { status: 403, .. }));

    let err = store.create_photo(&sample_record()).await.unwrap_err();
    assert!(matches!(err, MetadataError::Status { status: 403, .. }));
}

#[tokio::test]
async fn duplicate_create_is_rejected() {
    let endpoint = spawn_mock_firestore(Documents::default()).await;
    let store = store(&endpoint, API_KEY);
    let record = sample_record();

    store.create_photo(&record).await.unwrap();
    let err = store.create_photo(&record).await.unwrap_err();
    assert!(matches!(err, MetadataError::Status { status: 409, .. }));
}

#[tokio::test]
async fn ids_that_cannot_name_a_document_are_none() {
    let docs = Documents::default();
    let endpoint = spawn_mock_firestore(docs.clone()).await;
    let store = store(&endpoint, API_KEY);
    store.create_photo(&sample_record()).await.unwrap();

    let oversized = "x".repeat(1501);
    for id in [".", "..", "__name__", "a/b", oversized.as_str()] {
        assert_eq!(store.get_photo(id).await.unwrap(), None, "{id:?}");
    }

    // Nothing is sent for them, so even an unreachable endpoint answers.
    let offline = self::store("http://127.0.0.1:9/v1", API_KEY);
    assert_eq!(offline.get_photo("..").await.unwrap(), None);
}
