use actix_web::{App, HttpServer, web};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod app;
mod model;
mod service;
mod store;

use api::ApiError;
use app::AppState;
use model::Config;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    // Load .env file if present (ignore if missing)
    let _ = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    let bind_addr = config.bind_addr();

    let state = AppState::new(config)
        .await
        .map_err(|e| std::io::Error::other(e.to_string()))?;

    let paper_service = web::Data::from(state.paper_service);
    let upload_limit = web::Data::new(state.upload_limit);

    tracing::info!("Starting Paper Trail server on {}", bind_addr);

    HttpServer::new(move || {
        // Body parse errors can quote the rejected value
        let json_config = web::JsonConfig::default().error_handler(|_, _| {
            ApiError::BadRequest("request body must be valid JSON for this endpoint".to_string())
                .into()
        });

        App::new()
            .app_data(paper_service.clone())
            .app_data(upload_limit.clone())
            .app_data(json_config)
            .configure(api::paper::configure)
            .configure(api::health::configure)
            .configure(api::openapi::configure)
    })
    .bind(&bind_addr)?
    .run()
    .await
}
