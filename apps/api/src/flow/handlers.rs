//! Axum route handlers for the Flows API.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};
use serde::Serialize;
use serde_json::Value;

use crate::errors::AppError;
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowSummary {
    pub name: String,
    pub description: String,
    pub mode: &'static str,
    pub input_schema: Value,
    pub output_schema: Value,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// GET /api/v1/flows
///
/// Lists every registered flow with the shape of its input and output.
pub async fn handle_list_flows(State(state): State<AppState>) -> Json<Vec<FlowSummary>> {
    let flows = state
        .runner
        .registry()
        .iter()
        .map(|flow| FlowSummary {
            name: flow.name().to_string(),
            description: flow.description().to_string(),
            mode: flow.mode().label(),
            input_schema: flow.input_schema().to_response_schema(),
            output_schema: flow.output_schema().to_response_schema(),
        })
        .collect();

    Json(flows)
}

/// POST /api/v1/flows/:name
///
/// Runs one flow against a JSON object body and returns the flow's output object.
pub async fn handle_invoke_flow(
    State(state): State<AppState>,
    Path(name): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let Json(input) = body.map_err(|e| AppError::BadRequest(e.body_text()))?;

    let output = state.runner.invoke(&name, &input).await?;

    Ok(Json(output))
}
