//! Catalog Publisher API
//!
//! Administrative backend that publishes product records into a file-based
//! JSON catalog: per-product documents, shared index files and uploaded
//! media, all mutated through background jobs.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod catalog;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod jobs;
pub mod models;

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post, put},
    Router,
};

use catalog::CatalogService;
use jobs::JobStore;

/// Shared application state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub config: config::AppConfig,
    pub catalog: Arc<CatalogService>,
    pub jobs: Arc<JobStore>,
}

/// Build the full API router for the given state.
///
/// Mutations sit behind the admin token check; the health probe and the
/// job read path stay open, job ids being opaque and short-lived.
pub fn app_router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/products", post(handlers::products::create_product))
        .route(
            "/products/:id",
            put(handlers::products::update_product).delete(handlers::products::delete_product),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            handlers::require_admin_token,
        ));

    let api = Router::new()
        .route("/ping", get(handlers::health::ping))
        .route("/jobs/:id", get(handlers::jobs::get_job))
        .route("/jobs/:id/log", get(handlers::jobs::get_job_log))
        .merge(protected);

    Router::new()
        .nest("/api/catalog", api)
        .layer(DefaultBodyLimit::max(state.config.body_limit_bytes()))
        .with_state(state)
}
