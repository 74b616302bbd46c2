//! Business tools: form generator and idea generator.

use crate::catalogue::prompts::{BUSINESS_FORM_PROMPT, BUSINESS_IDEA_PROMPT};
use crate::flow::{FlowDefinition, PromptSpec};
use crate::llm_client::prompts::JSON_ONLY_SYSTEM;
use crate::schema::{FieldSpec, FieldType, Schema};
use crate::template::{Predicate, TemplateError};

pub const FORM_STYLES: &[&str] = &["fill-in", "completed"];

/// A blank ("fill-in") form must never see business or recipient details,
/// even when the caller sent them.
pub fn business_form() -> Result<FlowDefinition, TemplateError> {
    FlowDefinition::builder(
        "generate-business-form",
        "Generates a blank or completed business form in markdown",
    )
    .input(
        Schema::new()
            .field(FieldSpec::string("formDescription").min_length(1))
            .field(FieldSpec::enumeration("formStyle", FORM_STYLES))
            .field(
                FieldSpec::string("businessInformation")
                    .optional()
                    .describe("Name, address, contact details; used when completed"),
            )
            .field(
                FieldSpec::string("recipientInformation")
                    .optional()
                    .describe("Recipient name and address; used when completed"),
            ),
    )
    .output(Schema::new().field(FieldSpec::string("formContent").min_length(1)))
    .single(PromptSpec::json(BUSINESS_FORM_PROMPT)?.with_system(JSON_ONLY_SYSTEM))
    .clear_when(
        Predicate::Equals {
            field: "formStyle".to_string(),
            value: "fill-in".to_string(),
        },
        &["businessInformation", "recipientInformation"],
    )
    .build()
}

pub fn business_idea() -> Result<FlowDefinition, TemplateError> {
    let idea = Schema::new()
        .field(FieldSpec::string("title").describe("Concise, catchy title"))
        .field(FieldSpec::string("description").describe("One paragraph, naming the target customer"))
        .field(
            FieldSpec::array("firstSteps", FieldType::String)
                .min_items(1)
                .describe("3-5 actionable first steps"),
        );

    FlowDefinition::builder(
        "generate-business-idea",
        "Suggests business ideas grounded in the user's interests",
    )
    .input(Schema::new().field(FieldSpec::string("interests").min_length(1)))
    .output(Schema::new().field(
        FieldSpec::array("ideas", FieldType::Object(idea))
            .min_items(1)
            .describe("Distinct business ideas"),
    ))
    .single(PromptSpec::json(BUSINESS_IDEA_PROMPT)?.with_system(JSON_ONLY_SYSTEM))
    .build()
}
