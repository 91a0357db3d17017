use axum::{
    extract::{Multipart, Path, State},
    response::Json,
};
use serde::Serialize;
use tracing::info;

use crate::errors::ApiError;
use crate::jobs::{self, JobKind};
use crate::models::{ProductDraft, UploadedFile};
use crate::AppState;

/// Response to a mutation request: the job to poll.
#[derive(Debug, Serialize)]
pub struct JobAccepted {
    #[serde(rename = "jobId")]
    pub job_id: String,
}

/// Multipart fields shared by create and update.
#[derive(Default)]
struct MutationForm {
    payload: Option<String>,
    image: Option<UploadedFile>,
    pdf: Option<UploadedFile>,
    remove_pdf: bool,
}

/// Drain the multipart body into memory.
///
/// Upload streams are closed with the request, so the background job must
/// only ever see fully materialized byte buffers.
async fn read_mutation_form(mut multipart: Multipart) -> Result<MutationForm, ApiError> {
    let mut form = MutationForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("invalid multipart body: {}", e)))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "payload" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("unreadable payload field: {}", e)))?;
                form.payload = Some(text);
            }
            "image" | "pdf" => {
                let filename = field.file_name().unwrap_or("").to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("unreadable {} upload: {}", name, e)))?;
                // A file input left empty shows up as an empty part.
                if filename.is_empty() && bytes.is_empty() {
                    continue;
                }
                let upload = UploadedFile::new(filename, bytes);
                if name == "image" {
                    form.image = Some(upload);
                } else {
                    form.pdf = Some(upload);
                }
            }
            "remove_pdf" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("unreadable remove_pdf field: {}", e)))?;
                form.remove_pdf = matches!(
                    text.trim().to_lowercase().as_str(),
                    "1" | "true" | "yes" | "on"
                );
            }
            _ => {}
        }
    }

    Ok(form)
}

fn parse_draft(form: &MutationForm) -> Result<ProductDraft, ApiError> {
    let payload = form
        .payload
        .as_deref()
        .ok_or_else(|| ApiError::BadRequest("payload field is required".into()))?;
    serde_json::from_str(payload).map_err(|e| ApiError::BadRequest(format!("invalid payload: {}", e)))
}

/// `POST /api/catalog/products` — create a product in the background.
pub async fn create_product(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<JobAccepted>, ApiError> {
    let form = read_mutation_form(multipart).await?;
    let draft = parse_draft(&form)?;
    let image = form
        .image
        .ok_or_else(|| ApiError::BadRequest("image file is required".into()))?;
    let pdf = form.pdf;

    let catalog = state.catalog.clone();
    let job_id = jobs::dispatch(state.jobs.clone(), JobKind::Create, move |reporter| {
        catalog.create_product(&draft, &image, pdf.as_ref(), reporter)
    });

    info!(%job_id, "create job dispatched");
    Ok(Json(JobAccepted { job_id }))
}

/// `PUT /api/catalog/products/:id` — rewrite an existing product.
pub async fn update_product(
    State(state): State<AppState>,
    Path(product_id): Path<i64>,
    multipart: Multipart,
) -> Result<Json<JobAccepted>, ApiError> {
    let form = read_mutation_form(multipart).await?;
    let draft = parse_draft(&form)?;
    let image = form.image;
    let pdf = form.pdf;
    let remove_pdf = form.remove_pdf;

    let catalog = state.catalog.clone();
    let job_id = jobs::dispatch(state.jobs.clone(), JobKind::Update, move |reporter| {
        catalog.update_product(
            product_id,
            &draft,
            image.as_ref(),
            pdf.as_ref(),
            remove_pdf,
            reporter,
        )
    });

    info!(%job_id, product_id, "update job dispatched");
    Ok(Json(JobAccepted { job_id }))
}

/// `DELETE /api/catalog/products/:id` — remove a product.
pub async fn delete_product(
    State(state): State<AppState>,
    Path(product_id): Path<i64>,
) -> Result<Json<JobAccepted>, ApiError> {
    let catalog = state.catalog.clone();
    let job_id = jobs::dispatch(state.jobs.clone(), JobKind::Delete, move |reporter| {
        catalog.delete_product(product_id, reporter)
    });

    info!(%job_id, product_id, "delete job dispatched");
    Ok(Json(JobAccepted { job_id }))
}
