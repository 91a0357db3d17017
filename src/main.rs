use std::sync::Arc;

use axum::http::HeaderValue;
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{error, info};

use catalog_publisher_api as api;
use catalog_publisher_api::{catalog::CatalogService, jobs::JobStore};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cfg = api::config::load_config()?;
    api::config::init_tracing(cfg.log_level(), cfg.log_json);

    let catalog_root = cfg.catalog_root_path()?;
    info!(root = %catalog_root.display(), "using catalog root");

    let reports_dir = catalog_root.join("reports");
    let app_state = api::AppState {
        config: cfg.clone(),
        catalog: Arc::new(CatalogService::new(catalog_root)),
        jobs: Arc::new(JobStore::new(reports_dir)),
    };

    // CORS: explicit origin list when configured, permissive only in
    // development or with the explicit override flag.
    let origins: Vec<HeaderValue> = cfg
        .cors_allowed_origins
        .as_deref()
        .unwrap_or("")
        .split(',')
        .filter_map(|origin| {
            let trimmed = origin.trim();
            if trimmed.is_empty() {
                return None;
            }
            HeaderValue::from_str(trimmed).ok()
        })
        .collect();

    let cors_layer = if !origins.is_empty() {
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    } else if cfg.should_allow_permissive_cors() {
        info!(
            environment = %cfg.environment,
            "no explicit CORS origins configured, allowing any origin"
        );
        CorsLayer::permissive()
    } else {
        error!("refusing to start without CORS origins outside development");
        return Err(
            "set APP__CORS_ALLOWED_ORIGINS or APP__CORS_ALLOW_ANY_ORIGIN=true".into(),
        );
    };

    let app = api::app_router(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer);

    let addr = format!("{}:{}", cfg.host, cfg.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("catalog-publisher-api listening on http://{}", addr);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm =
            signal(SignalKind::terminate()).expect("failed to install signal handler");
        sigterm.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
