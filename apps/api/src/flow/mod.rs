// Flow orchestration: definitions, registry, runner, HTTP handlers.
// Every model call goes through the runner's `ModelInvoker`; nothing here
// talks to the provider directly.

pub mod definition;
pub mod handlers;
pub mod registry;
pub mod runner;

pub use definition::{FlowDefinition, PromptSpec, SubTask};
pub use registry::FlowRegistry;
pub use runner::FlowRunner;
