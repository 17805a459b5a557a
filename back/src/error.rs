use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use todos_api::v1::Problem;
use tracing::error;

use crate::storage::StorageError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// A name failed validation; the message is shown to the user as is.
    #[error("{0}")]
    Invalid(String),

    #[error("The specified list was not found.")]
    ListNotFound,

    /// The request body was not the JSON the route expects.
    #[error(transparent)]
    Body(#[from] JsonRejection),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Invalid(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::ListNotFound => StatusCode::NOT_FOUND,
            ApiError::Body(rejection) => rejection.status(),
            ApiError::Storage(err) => {
                error!(error = %err, "storage failure");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let message = match self {
            ApiError::Body(rejection) => rejection.body_text(),
            ApiError::Storage(_) => String::from("The request could not be completed."),
            other => other.to_string(),
        };

        (status, Json(Problem::new(message))).into_response()
    }
}
