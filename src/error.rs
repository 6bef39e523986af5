use crate::render::{self, Format};
use axum::{
    Json,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// What to tell the user when a report comes back empty.
#[derive(Clone, Debug, PartialEq)]
pub struct Guidance {
    pub heading: String,
    pub hints: Vec<String>,
}

impl Guidance {
    pub fn new(heading: impl Into<String>) -> Self {
        Self {
            heading: heading.into(),
            hints: Vec::new(),
        }
    }

    pub fn hint(mut self, hint: impl Into<String>) -> Self {
        self.hints.push(hint.into());
        self
    }
}

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("invalid parameter `{name}`: {reason}")]
    Validation { name: &'static str, reason: String },

    #[error("{}", .guidance.heading)]
    NoData { guidance: Guidance, format: Format },

    #[error("data access failed: {0}")]
    DataAccess(String),

    #[error("render failed: {0}")]
    Render(String),
}

impl ReportError {
    pub fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        ReportError::Validation {
            name,
            reason: reason.into(),
        }
    }
}

impl From<anyhow::Error> for ReportError {
    fn from(err: anyhow::Error) -> Self {
        ReportError::DataAccess(format!("{:#}", err))
    }
}

impl From<tokio::task::JoinError> for ReportError {
    fn from(err: tokio::task::JoinError) -> Self {
        ReportError::DataAccess(format!("query task failed: {}", err))
    }
}

impl IntoResponse for ReportError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            ReportError::Validation { .. } => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            ReportError::NoData { .. } => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ReportError::DataAccess(_) => (StatusCode::INTERNAL_SERVER_ERROR, "DATA_ACCESS_ERROR"),
            ReportError::Render(_) => (StatusCode::INTERNAL_SERVER_ERROR, "RENDER_ERROR"),
        };

        if status.is_server_error() {
            tracing::error!(code, error = %self, "report failed");
        } else {
            tracing::debug!(code, error = %self, "report rejected");
        }

        if let ReportError::NoData { guidance, format } = &self {
            if *format == Format::Table {
                return (status, Html(render::guidance_page(guidance))).into_response();
            }
            let body = Json(json!({
                "error": true,
                "code": code,
                "message": guidance.heading,
                "hints": guidance.hints,
            }));
            return (status, body).into_response();
        }

        let body = Json(json!({
            "error": true,
            "code": code,
            "message": self.to_string(),
        }));
        (status, body).into_response()
    }
}
