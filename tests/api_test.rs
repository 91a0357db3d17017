mod common;

use axum::{
    body::Body,
    http::{header, Method, Request},
};
use serde_json::json;

use common::{response_json, response_text, TestApp};

fn create_payload(name: &str) -> serde_json::Value {
    json!({
        "name": name,
        "manufacturer_id": 7,
        "category_ids": [3],
        "price_ht": 49.5,
        "short_html": "<p>Compact</p>",
        "long_html": "<p>Détails</p>",
        "active": true
    })
}

#[tokio::test]
async fn ping_needs_no_token() {
    let app = TestApp::new();
    let response = app
        .request(
            Request::builder()
                .uri("/api/catalog/ping")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), 200);
    let body = response_json(response).await;
    assert_eq!(body["ok"], true);
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn mutations_require_the_admin_token() {
    let app = TestApp::new();

    let response = app
        .request(
            Request::builder()
                .method(Method::POST)
                .uri("/api/catalog/products")
                .header(header::CONTENT_TYPE, "multipart/form-data; boundary=x")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), 401);

    let response = app
        .request(
            Request::builder()
                .method(Method::POST)
                .uri("/api/catalog/products")
                .header("x-admin-token", "wrong-token")
                .header(header::CONTENT_TYPE, "multipart/form-data; boundary=x")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), 401);

    // Job polling stays open; an unknown id is a plain 404.
    let response = app
        .request(
            Request::builder()
                .uri("/api/catalog/jobs/abcdef123456")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn create_product_end_to_end() {
    let app = TestApp::new();

    let response = app
        .send_mutation(
            Method::POST,
            "/api/catalog/products",
            &create_payload("Tensiomètre TB-200"),
            Some(("photo.png", b"png bytes")),
            Some(("fiche.pdf", b"%PDF fake")),
            None,
        )
        .await;
    assert_eq!(response.status(), 200);
    let accepted = response_json(response).await;
    let job_id = accepted["jobId"].as_str().expect("job id").to_string();
    assert_eq!(job_id.len(), 12);

    let snapshot = app.wait_for_job(&job_id).await;
    assert_eq!(snapshot["status"], "success", "{snapshot}");
    assert_eq!(snapshot["progress"], 100);
    assert_eq!(snapshot["result"]["id"], 1);
    assert_eq!(snapshot["result"]["slug"], "tensiometre-tb-200");

    let root = app.catalog_root().to_path_buf();
    assert!(root.join("products/000001.json").is_file());
    assert!(root
        .join("assets/products/1__tensiometre-tb-200/images/cover-large_default.png")
        .is_file());

    // The transcript endpoint serves the accumulated log lines.
    let response = app
        .get_authenticated(&format!("/api/catalog/jobs/{}/log", job_id))
        .await;
    assert_eq!(response.status(), 200);
    let transcript = response_text(response).await;
    assert!(transcript.contains("Draft contract OK"), "{transcript}");
    assert!(transcript.contains("SUCCESS"), "{transcript}");

    // And a report file lands under reports/.
    let reports: Vec<_> = std::fs::read_dir(root.join("reports"))
        .expect("reports dir")
        .flatten()
        .map(|e| e.file_name().to_string_lossy().to_string())
        .collect();
    assert!(
        reports.iter().any(|n| n.ends_with(&format!("{}.log", job_id))),
        "{reports:?}"
    );
}

#[tokio::test]
async fn invalid_draft_surfaces_as_job_error() {
    let app = TestApp::new();

    let mut payload = create_payload("Produit X");
    payload["category_ids"] = json!([999]);
    let response = app
        .send_mutation(
            Method::POST,
            "/api/catalog/products",
            &payload,
            Some(("photo.png", b"png bytes")),
            None,
            None,
        )
        .await;
    assert_eq!(response.status(), 200, "dispatch succeeds, the job fails");
    let accepted = response_json(response).await;

    let snapshot = app.wait_for_job(accepted["jobId"].as_str().unwrap()).await;
    assert_eq!(snapshot["status"], "error");
    assert_eq!(snapshot["error"]["code"], "invalid_draft");
    assert!(snapshot["result"].is_null());
}

#[tokio::test]
async fn malformed_payload_is_rejected_before_dispatch() {
    let app = TestApp::new();

    let boundary = "catalog-test-boundary";
    let body = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"payload\"\r\n\r\nnot json\r\n--{b}--\r\n",
        b = boundary
    );
    let response = app
        .request(
            Request::builder()
                .method(Method::POST)
                .uri("/api/catalog/products")
                .header("x-admin-token", common::ADMIN_TOKEN)
                .header(
                    header::CONTENT_TYPE,
                    format!("multipart/form-data; boundary={}", boundary),
                )
                .body(Body::from(body))
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), 400);
    let body = response_json(response).await;
    assert_eq!(body["error"], "Bad Request");
}

#[tokio::test]
async fn create_without_image_is_rejected() {
    let app = TestApp::new();

    let response = app
        .send_mutation(
            Method::POST,
            "/api/catalog/products",
            &create_payload("Produit X"),
            None,
            None,
            None,
        )
        .await;
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn update_and_delete_round_trip() {
    let app = TestApp::new();

    let response = app
        .send_mutation(
            Method::POST,
            "/api/catalog/products",
            &create_payload("Produit A"),
            Some(("photo.png", b"png bytes")),
            Some(("fiche.pdf", b"%PDF fake")),
            None,
        )
        .await;
    let accepted = response_json(response).await;
    let snapshot = app.wait_for_job(accepted["jobId"].as_str().unwrap()).await;
    assert_eq!(snapshot["status"], "success", "{snapshot}");

    // Update without a new image, dropping the PDF.
    let mut payload = create_payload("Produit A rev. 2");
    payload["price_ht"] = json!(59.0);
    let response = app
        .send_mutation(
            Method::PUT,
            "/api/catalog/products/1",
            &payload,
            None,
            None,
            Some("yes"),
        )
        .await;
    assert_eq!(response.status(), 200);
    let accepted = response_json(response).await;
    let snapshot = app.wait_for_job(accepted["jobId"].as_str().unwrap()).await;
    assert_eq!(snapshot["status"], "success", "{snapshot}");
    assert_eq!(snapshot["result"]["slug"], "produit-a");

    let root = app.catalog_root().to_path_buf();
    assert!(!root
        .join("assets/products/1__produit-a/pdf/fiche.pdf")
        .exists());

    // Delete.
    let response = app
        .request(
            Request::builder()
                .method(Method::DELETE)
                .uri("/api/catalog/products/1")
                .header("x-admin-token", common::ADMIN_TOKEN)
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), 200);
    let accepted = response_json(response).await;
    let snapshot = app.wait_for_job(accepted["jobId"].as_str().unwrap()).await;
    assert_eq!(snapshot["status"], "success", "{snapshot}");

    assert!(!root.join("products/000001.json").exists());
}

#[tokio::test]
async fn unknown_job_is_404() {
    let app = TestApp::new();
    let response = app.get_authenticated("/api/catalog/jobs/ffffffffffff").await;
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn delete_of_unknown_product_still_reports_success() {
    let app = TestApp::new();

    let response = app
        .request(
            Request::builder()
                .method(Method::DELETE)
                .uri("/api/catalog/products/77")
                .header("x-admin-token", common::ADMIN_TOKEN)
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), 200);
    let accepted = response_json(response).await;
    let snapshot = app.wait_for_job(accepted["jobId"].as_str().unwrap()).await;
    assert_eq!(snapshot["status"], "success", "{snapshot}");
}
