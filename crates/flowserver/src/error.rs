use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use flowcore::{BackendError, FlowError};
use serde::Serialize;
use std::fmt;

/// Error response
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

/// Maps engine errors onto HTTP statuses.
#[derive(Debug)]
pub struct ApiError(pub FlowError);

impl From<FlowError> for ApiError {
    fn from(error: FlowError) -> Self {
        ApiError(error)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match &self.0 {
            FlowError::DuplicateIdentifier { .. }
            | FlowError::TranslationFailure { .. }
            | FlowError::Serialization(_) => StatusCode::BAD_REQUEST,
            FlowError::NotFound(_)
            | FlowError::Backend(BackendError::DeploymentNotFound(_)) => StatusCode::NOT_FOUND,
            FlowError::Unauthorized => StatusCode::UNAUTHORIZED,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        if self.status_code().is_server_error() {
            tracing::error!("Request failed: {}", self.0);
        }
        HttpResponse::build(self.status_code()).json(ErrorResponse {
            error: self.0.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_deployment_is_not_found() {
        let error = ApiError(FlowError::Backend(BackendError::DeploymentNotFound("d1".to_string())));
        assert_eq!(error.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(error.to_string(), "Backend error: Deployment not found: d1");

        let error = ApiError(FlowError::Backend(BackendError::Storage("disk".to_string())));
        assert_eq!(error.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
