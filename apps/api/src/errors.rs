use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use thiserror::Error;

use crate::llm_client::InvokeError;
use crate::schema::{ValidationError, Violation};
use crate::template::TemplateError;

/// The five ways a flow invocation can fail.
#[derive(Debug, Clone, Error)]
pub enum FlowError {
    /// Bad input shape. Carries every violation, not just the first.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Defect in a flow definition. Never caused by user input.
    #[error("Template error: {0}")]
    Template(#[from] TemplateError),

    #[error("Generation capability unavailable: {0}")]
    CapabilityUnavailable(String),

    #[error("Content blocked: {0}")]
    ContentBlocked(String),

    /// The model answered in the wrong shape. `violations` is filled when the
    /// answer parsed but failed the flow's output schema.
    #[error("Malformed model output: {message}")]
    MalformedOutput {
        message: String,
        violations: Vec<Violation>,
    },
}

impl From<InvokeError> for FlowError {
    fn from(e: InvokeError) -> Self {
        match e {
            InvokeError::CapabilityUnavailable(msg) => FlowError::CapabilityUnavailable(msg),
            InvokeError::ContentBlocked(msg) => FlowError::ContentBlocked(msg),
            InvokeError::MalformedOutput(message) => FlowError::MalformedOutput {
                message,
                violations: Vec::new(),
            },
        }
    }
}

impl FlowError {
    /// Whether a caller may retry the same input unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, FlowError::CapabilityUnavailable(_))
    }
}

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Flow(#[from] FlowError),
}

fn violation_details(violations: &[Violation]) -> Value {
    Value::Array(
        violations
            .iter()
            .map(|v| json!({ "field": v.path, "message": v.kind.to_string() }))
            .collect(),
    )
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message, details) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone(), None),
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone(), None)
            }
            AppError::Flow(FlowError::Validation(e)) => (
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR",
                "The request has invalid fields".to_string(),
                Some(violation_details(&e.violations)),
            ),
            AppError::Flow(FlowError::Template(_)) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "TEMPLATE_ERROR",
                "This tool is misconfigured".to_string(),
                None,
            ),
            AppError::Flow(FlowError::CapabilityUnavailable(_)) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "CAPABILITY_UNAVAILABLE",
                "The AI service is temporarily unavailable. Please try again.".to_string(),
                None,
            ),
            AppError::Flow(FlowError::ContentBlocked(msg)) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "CONTENT_BLOCKED",
                format!("The request was blocked by the content safety filter: {msg}"),
                None,
            ),
            // Already logged with its invocation id by the flow runner.
            AppError::Flow(FlowError::MalformedOutput { violations, .. }) => (
                StatusCode::BAD_GATEWAY,
                "MALFORMED_OUTPUT",
                "The AI service returned an unexpected answer".to_string(),
                (!violations.is_empty()).then(|| violation_details(violations)),
            ),
        };
        let retryable = matches!(&self, AppError::Flow(e) if e.is_retryable());

        let mut error = json!({
            "code": code,
            "message": message
        });
        if let Some(details) = details {
            error["details"] = details;
        }
        if retryable {
            error["retryable"] = json!(true);
        }

        (status, Json(json!({ "error": error }))).into_response()
    }
}
