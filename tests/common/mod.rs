#![allow(dead_code)]
//! In-memory backends and a live server harness shared by the HTTP tests.

use async_trait::async_trait;
use bytes::Bytes;
use photo_relay::{
    models::photo::PhotoRecord,
    services::{
        metadata_store::{MetadataError, MetadataResult, MetadataStore},
        object_store::{ObjectStore, ObjectTags, StorageError, StorageResult},
        photo_service::PhotoService,
    },
    state::AppState,
};
use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};

pub const PUBLIC_BASE_URL: &str = "https://photos.example.com";

#[derive(Clone, Debug)]
pub struct StoredObject {
    pub body: Bytes,
    pub content_type: String,
    pub tags: ObjectTags,
}

/// Object store double that records every call.
#[derive(Default)]
pub struct MemoryObjectStore {
    pub objects: Mutex<HashMap<String, StoredObject>>,
    pub puts: AtomicUsize,
    pub gets: AtomicUsize,
    pub fail_puts: bool,
}

impl MemoryObjectStore {
    pub fn failing() -> Self {
        Self {
            fail_puts: true,
            ..Self::default()
        }
    }

    pub fn put_count(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    pub fn get_count(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    pub fn keys(&self) -> Vec<String> {
        self.objects.lock().unwrap().keys().cloned().collect()
    }

    pub fn object(&self, key: &str) -> Option<StoredObject> {
        self.objects.lock().unwrap().get(key).cloned()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put_object(
        &self,
        key: &str,
        body: Bytes,
        content_type: &str,
        tags: &ObjectTags,
    ) -> StorageResult<()> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        if self.fail_puts {
            return Err(StorageError::Backend("bucket unavailable".into()));
        }
        self.objects.lock().unwrap().insert(
            key.to_string(),
            StoredObject {
                body,
                content_type: content_type.to_string(),
                tags: tags.clone(),
            },
        );
        Ok(())
    }

    async fn get_object(&self, key: &str) -> StorageResult<Bytes> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.objects
            .lock()
            .unwrap()
            .get(key)
            .map(|obj| obj.body.clone())
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }
}

/// Metadata store double that records every call.
#[derive(Default)]
pub struct MemoryMetadataStore {
    pub records: Mutex<HashMap<String, PhotoRecord>>,
    pub creates: AtomicUsize,
    pub gets: AtomicUsize,
    pub fail_creates: bool,
}

impl MemoryMetadataStore {
    pub fn failing() -> Self {
        Self {
            fail_creates: true,
            ..Self::default()
        }
    }

    pub fn insert(&self, record: PhotoRecord) {
        self.records
            .lock()
            .unwrap()
            .insert(record.id.clone(), record);
    }

    pub fn create_count(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    pub fn get_count(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    pub fn record(&self, id: &str) -> Option<PhotoRecord> {
        self.records.lock().unwrap().get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }
}

#[async_trait]
impl MetadataStore for MemoryMetadataStore {
    async fn create_photo(&self, record: &PhotoRecord) -> MetadataResult<()> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        if self.fail_creates {
            return Err(MetadataError::Status {
                status: 503,
                body: "firestore unavailable".into(),
            });
        }
        self.insert(record.clone());
        Ok(())
    }

    async fn get_photo(&self, photo_id: &str) -> MetadataResult<Option<PhotoRecord>> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        Ok(self.record(photo_id))
    }
}

pub struct TestApp {
    pub base_url: String,
    pub client: reqwest::Client,
    pub objects: Arc<MemoryObjectStore>,
    pub metadata: Arc<MemoryMetadataStore>,
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

/// Serve `state` on an ephemeral port and return its base URL.
pub async fn serve(state: AppState) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, photo_relay::app(state)).await.unwrap();
    });
    format!("http://127.0.0.1:{port}")
}

pub async fn spawn_app() -> TestApp {
    spawn_app_with(MemoryObjectStore::default(), MemoryMetadataStore::default()).await
}

pub async fn spawn_app_with(objects: MemoryObjectStore, metadata: MemoryMetadataStore) -> TestApp {
    let objects = Arc::new(objects);
    let metadata = Arc::new(metadata);
    let service = PhotoService::new(objects.clone(), metadata.clone(), PUBLIC_BASE_URL);
    let base_url = serve(AppState::new(service)).await;

    TestApp {
        base_url,
        client: reqwest::Client::new(),
        objects,
        metadata,
    }
}

/// Multipart form carrying a file under `photo` and, optionally, `eventId`.
pub fn photo_form(
    bytes: &[u8],
    file_name: &str,
    content_type: &str,
    event_id: Option<&str>,
) -> reqwest::multipart::Form {
    let part = reqwest::multipart::Part::bytes(bytes.to_vec())
        .file_name(file_name.to_string())
        .mime_str(content_type)
        .unwrap();
    let form = reqwest::multipart::Form::new().part("photo", part);
    match event_id {
        Some(event_id) => form.text("eventId", event_id.to_string()),
        None => form,
    }
}

/// Minimal JPEG-looking payload.
pub fn jpeg_bytes() -> Vec<u8> {
    let mut bytes = vec![0xFF, 0xD8, 0xFF, 0xE0];
    bytes.extend((0..2048u32).map(|i| (i % 251) as u8));
    bytes.extend([0xFF, 0xD9]);
    bytes
}
