use crate::auth::AuthError;
use crate::decoder::UnknownFormat;
use crate::models::ValidationIssue;
use crate::state::ServiceError;
use axum::{http::StatusCode, response::{IntoResponse, Response}, Json};
use serde::Serialize;
use tracing::warn;

#[derive(Debug, Clone, Serialize)]
pub struct ErrorDetail {
    pub field: String,
    pub issue: String,
}

impl From<ValidationIssue> for ErrorDetail {
    fn from(issue: ValidationIssue) -> Self {
        Self {
            field: issue.field,
            issue: issue.issue,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub error: ErrorPayload,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorPayload {
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<ErrorDetail>,
    pub request_id: String,
}

#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
    pub details: Vec<ErrorDetail>,
    pub request_id: String,
}

impl AppError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>, request_id: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
            details: Vec::new(),
            request_id: request_id.into(),
        }
    }

    pub fn with_details(mut self, details: Vec<ErrorDetail>) -> Self {
        self.details = details;
        self
    }

    pub fn validation(issues: Vec<ValidationIssue>, request_id: impl Into<String>) -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            "VALIDATION_ERROR",
            "quiz validation failed",
            request_id,
        )
        .with_details(issues.into_iter().map(ErrorDetail::from).collect())
    }

    pub fn from_service(err: ServiceError, request_id: impl Into<String>) -> Self {
        let request_id = request_id.into();
        match err {
            ServiceError::Parse(err) => {
                Self::new(StatusCode::BAD_REQUEST, "PARSE_ERROR", err.to_string(), request_id)
            }
            ServiceError::Invalid(issues) => Self::validation(issues, request_id),
            err @ ServiceError::DuplicateTitle { .. } => {
                Self::new(StatusCode::CONFLICT, "DUPLICATE_TITLE", err.to_string(), request_id)
            }
            err @ ServiceError::NotFound(_) => {
                Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", err.to_string(), request_id)
            }
            err @ ServiceError::AllocationExhausted(_) => Self::new(
                StatusCode::SERVICE_UNAVAILABLE,
                "ALLOCATION_CONFLICT",
                err.to_string(),
                request_id,
            ),
            ServiceError::Encode(err) => {
                warn!("draft encoding failure ({}): {}", request_id, err);
                Self::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "failed to process quiz draft",
                    request_id,
                )
            }
            ServiceError::Store(err) => {
                warn!("storage failure ({}): {}", request_id, err);
                Self::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "storage failure",
                    request_id,
                )
            }
        }
    }

    pub fn from_auth(err: AuthError, request_id: impl Into<String>) -> Self {
        match err {
            AuthError::Missing => {
                Self::new(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", err.to_string(), request_id)
            }
            AuthError::Invalid => {
                Self::new(StatusCode::FORBIDDEN, "FORBIDDEN", err.to_string(), request_id)
            }
        }
    }

    pub fn forbidden(request_id: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, "FORBIDDEN", "access denied", request_id)
    }

    pub fn unknown_format(err: UnknownFormat, request_id: impl Into<String>) -> Self {
        Self::validation(vec![ValidationIssue::new("format", err.to_string())], request_id)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let payload = ErrorBody {
            error: ErrorPayload {
                code: self.code,
                message: self.message,
                details: self.details,
                request_id: self.request_id,
            },
        };
        (self.status, Json(payload)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::ParseError;
    use crate::store::StoreError;

    #[test]
    fn service_errors_map_to_status_codes() {
        let cases = [
            (ServiceError::Parse(ParseError::MissingTitle), StatusCode::BAD_REQUEST, "PARSE_ERROR"),
            (ServiceError::Invalid(vec![]), StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            (
                ServiceError::DuplicateTitle { title: "T".into(), existing_id: 3 },
                StatusCode::CONFLICT,
                "DUPLICATE_TITLE",
            ),
            (ServiceError::NotFound(1), StatusCode::NOT_FOUND, "NOT_FOUND"),
            (
                ServiceError::AllocationExhausted(5),
                StatusCode::SERVICE_UNAVAILABLE,
                "ALLOCATION_CONFLICT",
            ),
            (
                ServiceError::Encode(serde_json::from_str::<serde_json::Value>("{").unwrap_err()),
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
            ),
            (
                ServiceError::Store(StoreError::Conflict(2)),
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
            ),
        ];
        for (err, status, code) in cases {
            let app = AppError::from_service(err, "req");
            assert_eq!((app.status, app.code), (status, code));
        }
    }

    #[test]
    fn duplicate_message_names_existing_id() {
        let err = ServiceError::DuplicateTitle { title: "Sample".into(), existing_id: 4 };
        assert!(AppError::from_service(err, "req").message.contains("ID: 4"));
    }

    #[test]
    fn validation_issues_become_details() {
        let issues = vec![
            ValidationIssue::question(0, "answers", "must have at least 2 answers (found 1)"),
            ValidationIssue::new("title", "Quiz must have a title field"),
        ];
        let app = AppError::validation(issues, "req");
        assert_eq!(app.details.len(), 2);
        assert_eq!(app.details[0].field, "questions[0].answers");
    }
}
