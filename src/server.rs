use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{
    App, HttpServer,
    http::header,
    middleware::{Compress, DefaultHeaders, Logger, from_fn},
    web,
};
use anyhow::{Context, Result};
use log::info;

use crate::config::{Config, Environment};
use crate::csv_export::CsvExporter;
use crate::error::AppError;
use crate::handlers::{self, ApiFailure};
use crate::nbp::{NbpClient, RatesProvider};
use crate::rate_limit::{RateLimiter, limit_requests};

/// Shared, read-only per-process state handed to every handler.
pub struct AppState {
    pub provider: Arc<dyn RatesProvider>,
    pub exporter: CsvExporter,
    pub environment: Environment,
    pub limiter: RateLimiter,
}

impl AppState {
    pub fn new(
        provider: Arc<dyn RatesProvider>,
        exporter: CsvExporter,
        environment: Environment,
        limiter: RateLimiter,
    ) -> Self {
        Self {
            provider,
            exporter,
            environment,
            limiter,
        }
    }

    pub fn fail(&self, message: &str, error: impl Into<AppError>) -> ApiFailure {
        ApiFailure::new(message, error.into(), !self.environment.is_production())
    }
}

/// Registers the `/api` routes, body decoding rules and the 404 fallback.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(handlers::json_error_handler))
        .service(
            web::scope("/api")
                .wrap(from_fn(limit_requests))
                .route("/health", web::get().to(handlers::health))
                .service(
                    web::scope("/currency")
                        .route("/current", web::get().to(handlers::current_rates))
                        .route("/currencies", web::get().to(handlers::currencies))
                        .route(
                            "/historical/{code}/{date}",
                            web::get().to(handlers::historical_rate),
                        )
                        .route(
                            "/range/{code}/{start}/{end}",
                            web::get().to(handlers::historical_range),
                        )
                        .route("/export-csv", web::post().to(handlers::export_csv))
                        .route(
                            "/download/{filename}",
                            web::get().to(handlers::download_csv),
                        ),
                ),
        )
        .default_service(web::to(handlers::not_found));
}

fn cors(origin: &str) -> Cors {
    Cors::default()
        .allowed_origin(origin)
        .allowed_methods(vec!["GET", "POST"])
        .allowed_headers(vec![header::CONTENT_TYPE, header::ACCEPT])
        .supports_credentials()
        .max_age(3600)
}

fn security_headers() -> DefaultHeaders {
    DefaultHeaders::new()
        .add((header::X_CONTENT_TYPE_OPTIONS, "nosniff"))
        .add((header::X_FRAME_OPTIONS, "SAMEORIGIN"))
        .add((header::REFERRER_POLICY, "no-referrer"))
}

pub async fn run(config: Config) -> Result<()> {
    let provider = NbpClient::new(&config.nbp_api_url, config.request_timeout)?;
    let exporter = CsvExporter::new(&config.export_dir)?;
    let state = web::Data::new(AppState::new(
        Arc::new(provider),
        exporter.clone(),
        config.environment,
        RateLimiter::new(config.rate_limit_window, config.rate_limit_max_requests),
    ));

    let sweeper = exporter.spawn_cleanup_task(config.cleanup_interval);
    let purger = {
        let state = state.clone();
        let period = config.rate_limit_window;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                state.limiter.purge_expired();
            }
        })
    };

    info!("NBP API URL: {}", config.nbp_api_url);
    info!("Environment: {}", config.environment.as_str());
    info!("Exporting CSV files to {}", exporter.dir().display());
    info!("Server running on {}:{}", config.host, config.port);

    let cors_origin = config.cors_origin.clone();
    let result = HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .configure(configure)
            .wrap(security_headers())
            .wrap(Compress::default())
            .wrap(cors(&cors_origin))
            .wrap(Logger::default())
    })
    .bind((config.host.as_str(), config.port))
    .with_context(|| format!("Failed to bind {}:{}", config.host, config.port))?
    .shutdown_timeout(30)
    .run()
    .await;

    sweeper.abort();
    purger.abort();
    info!("Server stopped");

    result.context("HTTP server failed")
}
