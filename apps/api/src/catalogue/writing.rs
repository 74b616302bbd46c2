//! Writing tools: letter writer, document summarizer, prompt enhancer, OCR,
//! novel co-writer.

use crate::catalogue::prompts::{
    LETTER_PROMPT, NOVEL_PROMPT, OCR_PROMPT, PROMPT_SUGGESTION_PROMPT, SUMMARY_PROMPT,
};
use crate::flow::{FlowDefinition, PromptSpec};
use crate::llm_client::prompts::{JSON_ONLY_SYSTEM, MARKDOWN_WRITER_SYSTEM};
use crate::llm_client::GenerationConfig;
use crate::schema::{FieldSpec, Schema};
use crate::template::{Predicate, TemplateError};

pub fn personalized_letter() -> Result<FlowDefinition, TemplateError> {
    FlowDefinition::builder(
        "write-personalized-letter",
        "Writes a letter for a recipient in a chosen tone and purpose",
    )
    .input(
        Schema::new()
            .field(FieldSpec::string("tone").min_length(1).describe("formal, informal, friendly..."))
            .field(FieldSpec::string("purpose").min_length(1).describe("thank you, invitation, complaint..."))
            .field(FieldSpec::string("recipientName").min_length(1))
            .field(FieldSpec::string("letterBody").min_length(1)),
    )
    .output(Schema::new().field(
        FieldSpec::string("personalizedLetter").describe("The complete personalized letter"),
    ))
    .single(PromptSpec::json(LETTER_PROMPT)?.with_system(JSON_ONLY_SYSTEM))
    .build()
}

pub fn summarize_document() -> Result<FlowDefinition, TemplateError> {
    FlowDefinition::builder(
        "summarize-document",
        "Summarizes a document, highlighting key terms and conditions",
    )
    .input(Schema::new().field(FieldSpec::string("documentText").min_length(1)))
    .output(Schema::new().field(FieldSpec::string("summary").describe("Markdown summary")))
    .single(PromptSpec::json(SUMMARY_PROMPT)?.with_system(JSON_ONLY_SYSTEM))
    .build()
}

pub fn prompt_suggestion() -> Result<FlowDefinition, TemplateError> {
    FlowDefinition::builder(
        "generate-prompt-suggestion",
        "Rewrites a simple goal into a detailed prompt for another AI model",
    )
    .input(Schema::new().field(FieldSpec::string("goal").min_length(1)))
    .output(Schema::new().field(FieldSpec::string("suggestedPrompt").min_length(1)))
    .single(
        PromptSpec::text(PROMPT_SUGGESTION_PROMPT, "suggestedPrompt")?
            .with_config(GenerationConfig::default().with_max_output_tokens(1024)),
    )
    .build()
}

/// OCR over a photographed document sent as a base64 data URI.
pub fn extract_text_from_image() -> Result<FlowDefinition, TemplateError> {
    FlowDefinition::builder(
        "extract-text-from-image",
        "Extracts the text from a photo of a document",
    )
    .input(
        Schema::new().field(
            FieldSpec::string("imageDataUri")
                .data_uri()
                .describe("Expected format: 'data:<mimetype>;base64,<encoded_data>'"),
        ),
    )
    .output(Schema::new().field(FieldSpec::string("extractedText")))
    .single(PromptSpec::text(OCR_PROMPT, "extractedText")?.with_media("imageDataUri"))
    .build()
}

/// Generate, continue, reword, or enhance novel prose. Existing content is
/// dropped for `generate` so a fresh passage never echoes an old one, and is
/// required for every other task.
pub fn novel_co_writer() -> Result<FlowDefinition, TemplateError> {
    FlowDefinition::builder("novel-co-writer", "Co-writes novel prose with the author")
        .input(
            Schema::new()
                .field(FieldSpec::enumeration(
                    "task",
                    &["generate", "continue", "reword", "enhance"],
                ))
                .field(FieldSpec::string("currentContent").optional())
                .field(FieldSpec::string("instruction").min_length(1)),
        )
        .output(Schema::new().field(FieldSpec::string("generatedText").min_length(1)))
        .single(
            PromptSpec::text(NOVEL_PROMPT, "generatedText")?
                .with_system(MARKDOWN_WRITER_SYSTEM)
                .with_config(GenerationConfig::default().with_temperature(0.9)),
        )
        .require_unless(generate_task(), &["currentContent"])
        .clear_when(generate_task(), &["currentContent"])
        .build()
}

fn generate_task() -> Predicate {
    Predicate::Equals {
        field: "task".to_string(),
        value: "generate".to_string(),
    }
}
