use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use utoipa::ToSchema;

/// A single rejected input field.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ToSchema)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self { field: field.into(), message: message.into() }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("invalid input")]
    Validation(Vec<FieldError>),

    #[error("{0}")]
    NotFound(String),

    #[error("OMDb is not configured")]
    ProviderUnavailable,

    #[error("OMDb request failed: {0}")]
    Provider(String),

    #[error(transparent)]
    Database(#[from] sea_orm::DbErr),
}

impl AppError {
    pub fn film_not_found(id: i32) -> Self {
        Self::NotFound(format!("film {id} not found"))
    }

    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation(vec![FieldError::new(field, message)])
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::ProviderUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Provider(_) => StatusCode::BAD_GATEWAY,
            AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "validation",
            AppError::NotFound(_) => "not_found",
            AppError::ProviderUnavailable | AppError::Provider(_) => "provider",
            AppError::Database(_) => "internal",
        }
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return Self::Provider("request timed out".to_string());
        }
        Self::Provider(err.to_string())
    }
}

impl From<JsonRejection> for AppError {
    fn from(err: JsonRejection) -> Self {
        Self::invalid("body", err.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(err: QueryRejection) -> Self {
        Self::invalid("query", err.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(err: PathRejection) -> Self {
        Self::invalid("path", err.body_text())
    }
}

/// JSON body of every error response.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<FieldError>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            AppError::Database(err) => {
                tracing::error!(error = %err, "database error");
                "internal server error".to_string()
            },
            AppError::Provider(msg) => {
                tracing::warn!(error = %msg, "provider error");
                self.to_string()
            },
            _ => self.to_string(),
        };
        let kind = self.kind().to_string();
        let fields = match self {
            AppError::Validation(fields) => fields,
            _ => Vec::new(),
        };

        (status, Json(ErrorBody { error: kind, message, fields })).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
