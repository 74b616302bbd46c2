//! Built-in flow catalogue.
//!
//! Every flow the service exposes is declared here. Definitions are checked
//! when the registry is built, so a template that references an undeclared
//! field stops the server at startup instead of failing a request.

pub mod business;
pub mod course;
pub mod prompts;
pub mod writing;

use crate::flow::FlowRegistry;
use crate::template::TemplateError;

pub fn builtin_registry() -> Result<FlowRegistry, TemplateError> {
    let mut registry = FlowRegistry::new();

    registry.register(writing::personalized_letter()?)?;
    registry.register(writing::summarize_document()?)?;
    registry.register(writing::prompt_suggestion()?)?;
    registry.register(writing::extract_text_from_image()?)?;
    registry.register(writing::novel_co_writer()?)?;
    registry.register(course::course_outline()?)?;
    registry.register(course::edit_course_content()?)?;
    registry.register(course::relevant_multimedia()?)?;
    registry.register(business::business_form()?)?;
    registry.register(business::business_idea()?)?;

    Ok(registry)
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
