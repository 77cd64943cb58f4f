use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde_derive::Serialize;

/// Error surface of the management plane.
///
/// Everything detected before the first streamed byte maps onto a
/// conventional HTTP status through [`ResponseError`]; once a response is
/// streaming, failures only ever surface as `[ERROR]` tagged lines.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("invalid input: {0}")]
    InputInvalid(String),

    #[error("stack not found: {0}")]
    NotFound(String),

    #[error("conflicting values for key '{key}': env store has '{left}', secrets directory has '{right}'")]
    ConfigConflict {
        key: String,
        left: String,
        right: String,
    },

    #[error("unresolved placeholders: {}", vars.join(", "))]
    UnresolvedPlaceholder { vars: Vec<String> },

    #[error("command failed: {command} (exit code {code})")]
    SubprocessFailure { command: String, code: i32 },

    #[error("{context}: {source}")]
    Filesystem {
        context: String,
        source: std::io::Error,
    },

    #[error("{0}")]
    Internal(String),
}

impl AppError {
    pub fn fs(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Filesystem {
            context: context.into(),
            source,
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    status: &'static str,
    message: String,
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InputInvalid(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorBody {
            status: "error",
            message: self.to_string(),
        })
    }
}
