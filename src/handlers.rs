//! HTTP handlers: validate, call the provider or exporter, wrap the outcome in
//! an [`ApiEnvelope`].

use std::fmt;

use actix_files::NamedFile;
use actix_web::{
    HttpRequest, HttpResponse, ResponseError,
    error::{InternalError, JsonPayloadError},
    http::{
        StatusCode,
        header::{self, ContentDisposition, DispositionParam, DispositionType, HeaderValue},
    },
    web,
};
use chrono::{SecondsFormat, Utc};
use log::{error, warn};
use serde::Serialize;

use crate::envelope::ApiEnvelope;
use crate::error::AppError;
use crate::server::AppState;
use crate::validation::{
    CsvExportRequest, validate_csv_export_request, validate_currency_code, validate_date,
    validate_date_range, validate_filename,
};

/// A failed request, rendered as `{success: false, message, error}`.
#[derive(Debug)]
pub struct ApiFailure {
    message: String,
    error: AppError,
    verbose: bool,
}

impl ApiFailure {
    /// `verbose` exposes internal error chains to the caller.
    pub fn new(message: impl Into<String>, error: AppError, verbose: bool) -> Self {
        let message = message.into();
        if error.status_code().is_server_error() {
            error!("{message}: {error:?}");
        } else {
            warn!("{message}: {error}");
        }
        Self {
            message,
            error,
            verbose,
        }
    }

    fn detail(&self) -> String {
        match &self.error {
            AppError::Internal(e) if self.verbose => format!("{e:?}"),
            AppError::Internal(_) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for ApiFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.message, self.error)
    }
}

impl ResponseError for ApiFailure {
    fn status_code(&self) -> StatusCode {
        self.error.status_code()
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .json(ApiEnvelope::err(self.message.clone(), Some(self.detail())))
    }
}

#[derive(Debug, Serialize)]
struct HealthStatus {
    success: bool,
    message: &'static str,
    timestamp: String,
    environment: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportSummary {
    pub filename: String,
    pub record_count: usize,
    pub download_url: String,
}

pub async fn health(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(HealthStatus {
        success: true,
        message: "Currency Exchange API is running",
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        environment: state.environment.as_str(),
    })
}

pub async fn not_found() -> HttpResponse {
    HttpResponse::NotFound().json(ApiEnvelope::err("Endpoint not found", None))
}

pub async fn current_rates(state: web::Data<AppState>) -> Result<HttpResponse, ApiFailure> {
    let rates = state
        .provider
        .current_rates()
        .await
        .map_err(|e| state.fail("Failed to fetch current rates", e))?;

    Ok(HttpResponse::Ok().json(ApiEnvelope::ok(
        rates,
        "Current exchange rates retrieved successfully",
    )))
}

pub async fn currencies(state: web::Data<AppState>) -> Result<HttpResponse, ApiFailure> {
    let currencies = state
        .provider
        .available_currencies()
        .await
        .map_err(|e| state.fail("Failed to fetch available currencies", e))?;

    Ok(HttpResponse::Ok().json(ApiEnvelope::ok(
        currencies,
        "Available currencies retrieved successfully",
    )))
}

pub async fn historical_rate(
    state: web::Data<AppState>,
    path: web::Path<(String, String)>,
) -> Result<HttpResponse, ApiFailure> {
    let (code, date) = path.into_inner();
    let code = validate_currency_code(&code).map_err(|e| state.fail("Invalid currency code", e))?;
    let date = validate_date(&date).map_err(|e| state.fail("Invalid date", e))?;

    let point = state
        .provider
        .historical_rate(&code, date)
        .await
        .map_err(|e| state.fail("Failed to fetch historical rate", e))?;

    Ok(HttpResponse::Ok().json(ApiEnvelope::ok(
        point,
        format!("Historical rate for {code} on {date} retrieved successfully"),
    )))
}

pub async fn historical_range(
    state: web::Data<AppState>,
    path: web::Path<(String, String, String)>,
) -> Result<HttpResponse, ApiFailure> {
    let (code, start, end) = path.into_inner();
    let query =
        validate_date_range(&code, &start, &end).map_err(|e| state.fail("Invalid date range", e))?;

    let points = state
        .provider
        .historical_rates(&query)
        .await
        .map_err(|e| state.fail("Failed to fetch historical rates", e))?;

    let message = format!(
        "Retrieved {} rates for {} between {} and {}",
        points.len(),
        query.currency_code,
        query.start,
        query.end
    );
    Ok(HttpResponse::Ok().json(ApiEnvelope::ok(points, message)))
}

pub async fn export_csv(
    state: web::Data<AppState>,
    body: web::Json<CsvExportRequest>,
) -> Result<HttpResponse, ApiFailure> {
    let job = validate_csv_export_request(&body)
        .map_err(|e| state.fail("Invalid CSV export parameters", e))?;
    let code = &job.range.currency_code;

    let points = state
        .provider
        .historical_rates(&job.range)
        .await
        .map_err(|e| state.fail("Failed to export CSV", e))?;

    let currency_name = match state.provider.available_currencies().await {
        Ok(list) => list
            .into_iter()
            .find(|c| c.code == code.as_str())
            .map(|c| c.name),
        Err(e) => {
            warn!("Can't resolve name of {code}, using the code instead: {e}");
            None
        }
    }
    .unwrap_or_else(|| code.to_string());

    let artifact = state
        .exporter
        .export(&job, &currency_name, &points)
        .await
        .map_err(|e| state.fail("Failed to export CSV", e))?;

    Ok(HttpResponse::Ok().json(ApiEnvelope::ok(
        ExportSummary {
            download_url: format!("/api/currency/download/{}", artifact.filename),
            filename: artifact.filename,
            record_count: artifact.record_count,
        },
        "CSV export completed successfully",
    )))
}

pub async fn download_csv(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiFailure> {
    let filename = path.into_inner();
    validate_filename(&filename).map_err(|e| state.fail("Invalid filename", e))?;

    let target = state.exporter.file_for_download(&filename).await;
    if !target.exists {
        return Err(state.fail(
            "File not found",
            AppError::NotFound(format!("{filename} does not exist")),
        ));
    }

    let file = NamedFile::open_async(&target.file_path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            state.fail(
                "File not found",
                AppError::NotFound(format!("{filename} does not exist")),
            )
        } else {
            state.fail("Failed to download file", anyhow::Error::new(e))
        }
    })?;

    // The body is streamed from disk in chunks.
    let mut resp = file
        .use_etag(false)
        .use_last_modified(false)
        .set_content_disposition(ContentDisposition {
            disposition: DispositionType::Attachment,
            parameters: vec![DispositionParam::Filename(filename)],
        })
        .into_response(&req);
    resp.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/csv; charset=utf-8"),
    );
    Ok(resp)
}

/// Turns undecodable JSON bodies into a 400 envelope.
pub fn json_error_handler(err: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    warn!("Rejected request body: {err}");
    let resp = HttpResponse::BadRequest().json(ApiEnvelope::err(
        "Invalid CSV export parameters",
        Some(err.to_string()),
    ));
    InternalError::from_response(err, resp).into()
}
