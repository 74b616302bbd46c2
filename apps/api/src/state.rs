use crate::config::Config;
use crate::flow::FlowRunner;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Owns the flow registry and the model invoker.
    pub runner: FlowRunner,
    pub config: Config,
}
