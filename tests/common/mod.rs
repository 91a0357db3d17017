#![allow(dead_code)]

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use axum::{
    body::Body,
    http::{header, Method, Request},
    response::Response,
    Router,
};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use catalog_publisher_api::{
    catalog::{CatalogPaths, CatalogService, PublishReporter},
    config::AppConfig,
    jobs::JobStore,
    models::{ProductDraft, UploadedFile},
    AppState,
};

pub const ADMIN_TOKEN: &str = "test-admin-token-123456";

/// Write the four catalog documents a fresh root needs: two empty indexes
/// and a small taxonomy tree (category 3 under 2 under 1).
pub fn seed_catalog(root: &Path) {
    fs::create_dir_all(root.join("taxonomies")).expect("taxonomies dir");
    fs::write(
        root.join("taxonomies/manufacturers.json"),
        serde_json::to_string_pretty(&json!({"manufacturers": [
            {"id": 7, "name": "Acme Instruments"},
            {"id": 9, "name": "Orion Medical"}
        ]}))
        .unwrap(),
    )
    .expect("manufacturers.json");
    fs::write(
        root.join("taxonomies/categories.json"),
        serde_json::to_string_pretty(&json!({"categories": [
            {"id": 1, "name": "Diagnostic", "id_parent": 0},
            {"id": 2, "name": "Oxymétrie", "id_parent": 1},
            {"id": 3, "name": "Capteurs", "id_parent": 2}
        ]}))
        .unwrap(),
    )
    .expect("categories.json");
    fs::write(root.join("index.products.json"), "[]\n").expect("products index");
    fs::write(root.join("index.search.json"), "[]\n").expect("search index");
}

/// Fresh seeded catalog in a temp directory.
pub fn seeded_catalog() -> (TempDir, CatalogPaths) {
    let dir = tempfile::tempdir().expect("tempdir");
    seed_catalog(dir.path());
    let paths = CatalogPaths::new(dir.path());
    (dir, paths)
}

pub fn draft(name: &str) -> ProductDraft {
    serde_json::from_value(json!({
        "name": name,
        "manufacturer_id": 7,
        "category_ids": [3],
        "price_ht": 129.9,
        "short_html": "<p>Mesure rapide</p>",
        "long_html": "<p>Description complète</p>",
        "active": true
    }))
    .expect("draft json")
}

pub fn png_upload() -> UploadedFile {
    UploadedFile::new("photo.PNG".to_string(), bytes::Bytes::from_static(b"\x89PNG fake"))
}

pub fn pdf_upload() -> UploadedFile {
    UploadedFile::new("fiche.pdf".to_string(), bytes::Bytes::from_static(b"%PDF-1.4 fake"))
}

pub fn read_json_file(path: &Path) -> Value {
    let bytes = fs::read(path).unwrap_or_else(|e| panic!("read {}: {}", path.display(), e));
    serde_json::from_slice(&bytes).unwrap_or_else(|e| panic!("parse {}: {}", path.display(), e))
}

/// Reporter that records log lines and progress marks.
#[derive(Default)]
pub struct RecordingReporter {
    pub lines: Mutex<Vec<String>>,
    pub marks: Mutex<Vec<u8>>,
}

impl PublishReporter for RecordingReporter {
    fn log(&self, line: &str) {
        self.lines.lock().unwrap().push(line.to_string());
    }

    fn progress(&self, pct: u8) {
        self.marks.lock().unwrap().push(pct);
    }
}

/// In-process application over a seeded temp catalog.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    _dir: TempDir,
}

impl TestApp {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        seed_catalog(dir.path());

        let config = AppConfig {
            catalog_root: dir.path().display().to_string(),
            admin_token: ADMIN_TOKEN.to_string(),
            host: "127.0.0.1".to_string(),
            port: 0,
            environment: "development".to_string(),
            log_level: "debug".to_string(),
            log_json: false,
            cors_allowed_origins: None,
            cors_allow_any_origin: false,
            body_limit_mb: 8,
        };

        let state = AppState {
            config,
            catalog: Arc::new(CatalogService::new(dir.path())),
            jobs: Arc::new(JobStore::new(dir.path().join("reports"))),
        };
        let router = catalog_publisher_api::app_router(state.clone());

        Self {
            router,
            state,
            _dir: dir,
        }
    }

    pub fn catalog_root(&self) -> &Path {
        self.state.catalog.paths().root()
    }

    pub async fn request(&self, request: Request<Body>) -> Response {
        self.router.clone().oneshot(request).await.expect("infallible")
    }

    pub async fn get_authenticated(&self, uri: &str) -> Response {
        let request = Request::builder()
            .method(Method::GET)
            .uri(uri)
            .header("x-admin-token", ADMIN_TOKEN)
            .body(Body::empty())
            .expect("request");
        self.request(request).await
    }

    /// POST/PUT a multipart mutation with the standard field names.
    pub async fn send_mutation(
        &self,
        method: Method,
        uri: &str,
        payload: &Value,
        image: Option<(&str, &[u8])>,
        pdf: Option<(&str, &[u8])>,
        remove_pdf: Option<&str>,
    ) -> Response {
        let boundary = "catalog-test-boundary";
        let mut body = Vec::new();
        push_text_part(&mut body, boundary, "payload", &payload.to_string());
        if let Some((filename, bytes)) = image {
            push_file_part(&mut body, boundary, "image", filename, bytes);
        }
        if let Some((filename, bytes)) = pdf {
            push_file_part(&mut body, boundary, "pdf", filename, bytes);
        }
        if let Some(flag) = remove_pdf {
            push_text_part(&mut body, boundary, "remove_pdf", flag);
        }
        body.extend_from_slice(format!("--{}--\r\n", boundary).as_bytes());

        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("x-admin-token", ADMIN_TOKEN)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", boundary),
            )
            .body(Body::from(body))
            .expect("request");
        self.request(request).await
    }

    /// Poll a job until it leaves the queued/running states.
    pub async fn wait_for_job(&self, job_id: &str) -> Value {
        for _ in 0..200 {
            let response = self
                .get_authenticated(&format!("/api/catalog/jobs/{}", job_id))
                .await;
            assert_eq!(response.status(), 200, "job {} not found", job_id);
            let snapshot = response_json(response).await;
            match snapshot["status"].as_str() {
                Some("queued") | Some("running") => {
                    tokio::time::sleep(Duration::from_millis(20)).await;
                }
                Some(_) => return snapshot,
                None => panic!("job snapshot without status: {}", snapshot),
            }
        }
        panic!("job {} did not settle", job_id);
    }
}

fn push_text_part(body: &mut Vec<u8>, boundary: &str, name: &str, value: &str) {
    body.extend_from_slice(
        format!(
            "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
            boundary, name, value
        )
        .as_bytes(),
    );
}

fn push_file_part(body: &mut Vec<u8>, boundary: &str, name: &str, filename: &str, bytes: &[u8]) {
    body.extend_from_slice(
        format!(
            "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
            boundary, name, filename
        )
        .as_bytes(),
    );
    body.extend_from_slice(bytes);
    body.extend_from_slice(b"\r\n");
}

pub async fn response_json(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    serde_json::from_slice(&bytes).expect("json response")
}

pub async fn response_text(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    String::from_utf8(bytes.to_vec()).expect("utf8 body")
}
