use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde::Serialize;
use tracing::error;
use utoipa::ToSchema;

use crate::repo::RepoError;

#[derive(Debug, Serialize, ToSchema)]
pub struct ApiErrorBody {
    pub error: String,
}

#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    #[error("not found")] NotFound,
    #[error("{0}")] BadRequest(String),
    // store details never reach the client
    #[error("constraint fails")] Conflict,
    #[error("internal error")] Internal,
}

impl From<RepoError> for ApiError {
    fn from(e: RepoError) -> Self {
        match e {
            RepoError::NotFound => ApiError::NotFound,
            RepoError::InvalidArgument(msg) => ApiError::BadRequest(msg),
            RepoError::InvalidPage(e) => ApiError::BadRequest(e.to_string()),
            RepoError::InvalidSortField(field) => ApiError::BadRequest(format!("invalid sort field: {field}")),
            RepoError::ConstraintViolation => ApiError::Conflict,
            RepoError::Internal(msg) => {
                error!("internal repository error: {msg}");
                ApiError::Internal
            }
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Conflict => StatusCode::CONFLICT,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ApiErrorBody { error: self.to_string() })
    }
}
