use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use derive_more::Display;
use serde_json::json;

/// Failure of an approval operation.
///
/// Every variant maps to a machine-readable `kind` so a client can tell
/// "not allowed" from "already decided" from "bad input".
#[derive(Debug, Display)]
pub enum WorkflowError {
    #[display(fmt = "{}", _0)]
    Validation(String),

    #[display(fmt = "{}", _0)]
    Authorization(String),

    #[display(fmt = "{}", _0)]
    State(String),

    #[display(fmt = "{}", _0)]
    NotFound(String),

    #[display(fmt = "{}", _0)]
    Configuration(String),

    /// A concurrent writer changed the request first.
    #[display(fmt = "{}", _0)]
    Conflict(String),

    #[display(fmt = "storage error: {}", _0)]
    Storage(sqlx::Error),
}

impl std::error::Error for WorkflowError {}

impl From<sqlx::Error> for WorkflowError {
    fn from(e: sqlx::Error) -> Self {
        WorkflowError::Storage(e)
    }
}

impl WorkflowError {
    pub fn kind(&self) -> &'static str {
        match self {
            WorkflowError::Validation(_) => "validation_error",
            WorkflowError::Authorization(_) => "authorization_error",
            WorkflowError::State(_) => "state_error",
            WorkflowError::NotFound(_) => "not_found",
            WorkflowError::Configuration(_) => "configuration_error",
            WorkflowError::Conflict(_) => "conflict",
            WorkflowError::Storage(_) => "internal_error",
        }
    }
}

impl ResponseError for WorkflowError {
    fn status_code(&self) -> StatusCode {
        match self {
            WorkflowError::Validation(_) => StatusCode::BAD_REQUEST,
            WorkflowError::Authorization(_) => StatusCode::FORBIDDEN,
            WorkflowError::State(_) | WorkflowError::Conflict(_) => StatusCode::CONFLICT,
            WorkflowError::NotFound(_) => StatusCode::NOT_FOUND,
            WorkflowError::Configuration(_) => StatusCode::UNPROCESSABLE_ENTITY,
            WorkflowError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let message = match self {
            WorkflowError::Storage(e) => {
                tracing::error!(error = %e, "Database error");
                "Internal Server Error".to_string()
            }
            other => other.to_string(),
        };

        HttpResponse::build(self.status_code()).json(json!({
            "error": {
                "kind": self.kind(),
                "message": message,
            }
        }))
    }
}
