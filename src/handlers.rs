use crate::auth::Principal;
use crate::decoder::SourceFormat;
use crate::error::{AppError, ErrorDetail};
use crate::models::{Attempt, QuizDefinition, QuizSummary};
use crate::state::{AppState, Preview};
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use validator::{Validate, ValidationErrors};

fn request_id_from_headers(headers: &HeaderMap) -> String {
    headers
        .get("x-request-id")
        .and_then(|h| h.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
}

fn require_principal(state: &AppState, headers: &HeaderMap, req_id: &str) -> Result<Principal, AppError> {
    state
        .auth
        .authenticate(headers)
        .map_err(|err| AppError::from_auth(err, req_id))
}

fn require_admin(state: &AppState, headers: &HeaderMap, req_id: &str) -> Result<Principal, AppError> {
    let principal = require_principal(state, headers, req_id)?;
    if !principal.is_admin() {
        return Err(AppError::forbidden(req_id));
    }
    Ok(principal)
}

fn payload_errors(errors: ValidationErrors, req_id: String) -> AppError {
    let details = errors
        .field_errors()
        .into_iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |e| ErrorDetail {
                field: field.to_string(),
                issue: e
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| e.code.to_string()),
            })
        })
        .collect();
    AppError::new(StatusCode::BAD_REQUEST, "VALIDATION_ERROR", "invalid request", req_id)
        .with_details(details)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizCreatedResponse {
    pub quiz_id: u32,
    pub title: String,
}

impl From<QuizDefinition> for QuizCreatedResponse {
    fn from(quiz: QuizDefinition) -> Self {
        Self {
            quiz_id: quiz.id,
            title: quiz.title,
        }
    }
}

pub async fn create_quiz(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<Value>,
) -> Result<(StatusCode, Json<QuizCreatedResponse>), AppError> {
    let req_id = request_id_from_headers(&headers);
    require_admin(&state, &headers, &req_id)?;
    let quiz = state
        .submit_candidate(&payload)
        .await
        .map_err(|err| AppError::from_service(err, req_id))?;
    Ok((StatusCode::CREATED, Json(quiz.into())))
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UploadPayload {
    #[validate(length(min = 1, message = "content must not be empty"))]
    pub content: String,
    pub format: Option<String>,
    pub file_name: Option<String>,
}

impl UploadPayload {
    /// An explicit `format` wins over the file extension.
    fn source_format(&self, req_id: &str) -> Result<SourceFormat, AppError> {
        match (&self.format, &self.file_name) {
            (Some(format), _) => format
                .parse()
                .map_err(|err| AppError::unknown_format(err, req_id)),
            (None, Some(name)) => Ok(SourceFormat::from_file_name(name)),
            (None, None) => Ok(SourceFormat::default()),
        }
    }
}

pub async fn upload_quiz(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<UploadPayload>,
) -> Result<(StatusCode, Json<QuizCreatedResponse>), AppError> {
    let req_id = request_id_from_headers(&headers);
    require_admin(&state, &headers, &req_id)?;
    payload
        .validate()
        .map_err(|errors| payload_errors(errors, req_id.clone()))?;
    let format = payload.source_format(&req_id)?;
    let quiz = state
        .submit_text(&payload.content, format)
        .await
        .map_err(|err| AppError::from_service(err, req_id))?;
    Ok((StatusCode::CREATED, Json(quiz.into())))
}

pub async fn preview_quiz(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<UploadPayload>,
) -> Result<Json<Preview>, AppError> {
    let req_id = request_id_from_headers(&headers);
    require_admin(&state, &headers, &req_id)?;
    payload
        .validate()
        .map_err(|errors| payload_errors(errors, req_id.clone()))?;
    let format = payload.source_format(&req_id)?;
    let preview = state
        .preview_text(&payload.content, format)
        .await
        .map_err(|err| AppError::from_service(err, req_id))?;
    Ok(Json(preview))
}

#[derive(Debug, Serialize)]
pub struct QuizListResponse {
    pub items: Vec<QuizSummary>,
    pub total: usize,
}

pub async fn list_quizzes(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<QuizListResponse>, AppError> {
    let req_id = request_id_from_headers(&headers);
    let items = state
        .list_quizzes()
        .await
        .map_err(|err| AppError::from_service(err, req_id))?;
    Ok(Json(QuizListResponse { total: items.len(), items }))
}

pub async fn get_quiz(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<u32>,
) -> Result<Json<QuizDefinition>, AppError> {
    let req_id = request_id_from_headers(&headers);
    let quiz = state
        .get_quiz(id)
        .await
        .map_err(|err| AppError::from_service(err, req_id))?;
    Ok(Json(quiz))
}

pub async fn delete_quiz(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<u32>,
) -> Result<StatusCode, AppError> {
    let req_id = request_id_from_headers(&headers);
    require_admin(&state, &headers, &req_id)?;
    state
        .delete_quiz(id)
        .await
        .map_err(|err| AppError::from_service(err, req_id))?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize, Validate)]
pub struct AttemptPayload {
    #[validate(length(min = 3, message = "username must be at least 3 characters"))]
    pub username: String,
    pub quiz: QuizDefinition,
    pub duration: u64,
}

pub async fn submit_attempt(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<AttemptPayload>,
) -> Result<(StatusCode, Json<Attempt>), AppError> {
    let req_id = request_id_from_headers(&headers);
    let principal = require_principal(&state, &headers, &req_id)?;
    payload
        .validate()
        .map_err(|errors| payload_errors(errors, req_id.clone()))?;
    if !principal.may_act_for(&payload.username) {
        return Err(AppError::forbidden(req_id));
    }
    let attempt = state
        .record_attempt(&payload.username, &payload.quiz, payload.duration)
        .await
        .map_err(|err| AppError::from_service(err, req_id))?;
    Ok((StatusCode::CREATED, Json(attempt)))
}

#[derive(Debug, Serialize)]
pub struct AttemptListResponse {
    pub items: Vec<Attempt>,
    pub total: usize,
}

pub async fn attempt_history(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(username): Path<String>,
) -> Result<Json<AttemptListResponse>, AppError> {
    let req_id = request_id_from_headers(&headers);
    let principal = require_principal(&state, &headers, &req_id)?;
    if !principal.may_act_for(&username) {
        return Err(AppError::forbidden(req_id));
    }
    let items = state
        .attempt_history(&username)
        .await
        .map_err(|err| AppError::from_service(err, req_id))?;
    Ok(Json(AttemptListResponse { total: items.len(), items }))
}
