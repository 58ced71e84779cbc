//! Failure taxonomy shared by the validator, the upstream client, the
//! exporter and the HTTP layer.

use actix_web::http::StatusCode;
use thiserror::Error;

/// A rejected input. The display text is safe to show to the caller.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("\"{0}\" is required")]
    Missing(&'static str),

    #[error("Date must be in YYYY-MM-DD format")]
    DateFormat,

    #[error("Invalid date")]
    InvalidDate,

    #[error("Date cannot be in the future")]
    FutureDate,

    #[error("Currency code must be exactly 3 characters")]
    CodeLength,

    #[error("Currency code must contain only uppercase letters")]
    CodeCharacters,

    #[error("Start date must be before end date")]
    RangeOrder,

    #[error("Filename must be a valid CSV filename")]
    Filename,
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The upstream has no data for the requested key.
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    UpstreamEmpty(String),

    /// Transport failure, timeout or a non-2xx answer from the NBP API.
    #[error("NBP API Error: {0}")]
    UpstreamUnavailable(String),

    /// The I/O cause is kept for logs only.
    #[error("Failed to export data to CSV")]
    ExportFailed(#[source] anyhow::Error),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::UpstreamEmpty(_)
            | AppError::UpstreamUnavailable(_)
            | AppError::ExportFailed(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_status_codes() {
        assert_eq!(
            AppError::from(ValidationError::RangeOrder).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::NotFound("no data".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::UpstreamUnavailable("503".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            AppError::Internal(anyhow::anyhow!("boom")).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn export_failure_hides_io_cause() {
        let err = AppError::ExportFailed(anyhow::anyhow!("permission denied: /srv/uploads"));
        assert_eq!(err.to_string(), "Failed to export data to CSV");
    }
}
