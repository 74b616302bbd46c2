pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::flow::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Flows API
        .route("/api/v1/flows", get(handlers::handle_list_flows))
        .route("/api/v1/flows/:name", post(handlers::handle_invoke_flow))
        .with_state(state)
}
