use crate::dispatch::SearchError;
use crate::watchlist::PersistenceError;
use rocket::http::Status;
use rocket::serde::json::Json;
use serde::{Deserialize, Serialize};
use tracing::error;

pub mod platforms;
pub mod search;
pub mod watchlist;

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ErrorResponse {
    pub message: String,
    pub error_type: String,
}

pub type ApiError = (Status, Json<ErrorResponse>);
pub type ApiResult<T> = Result<Json<T>, ApiError>;

pub fn api_error(status: Status, message: impl Into<String>, error_type: &str) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            message: message.into(),
            error_type: error_type.to_string(),
        }),
    )
}

impl From<SearchError> for ErrorResponse {
    fn from(e: SearchError) -> Self {
        ErrorResponse {
            message: e.to_string(),
            error_type: match e {
                SearchError::InvalidRequest(_) => "invalid_request".to_string(),
                SearchError::TotalFailure { .. } => "no_results".to_string(),
            },
        }
    }
}

pub fn search_error(e: SearchError) -> ApiError {
    let status = match e {
        SearchError::InvalidRequest(_) => Status::BadRequest,
        SearchError::TotalFailure { .. } => Status::NotFound,
    };
    (status, Json(e.into()))
}

pub fn persistence_error(e: PersistenceError) -> ApiError {
    match e {
        PersistenceError::InvalidEmail(_) => {
            api_error(Status::BadRequest, e.to_string(), "invalid_email")
        }
        e => {
            error!(error = %e, "watchlist store failed");
            api_error(Status::InternalServerError, e.to_string(), "persistence_error")
        }
    }
}
