//! Course designer tools: outline generation, content editing, multimedia suggestions.

use crate::catalogue::prompts::{
    COURSE_OUTLINE_PROMPT, EDIT_COURSE_PROMPT, IMAGE_SUGGESTION_PROMPT, VIDEO_SUGGESTION_PROMPT,
};
use crate::flow::{FlowDefinition, PromptSpec, SubTask};
use crate::llm_client::prompts::{JSON_ONLY_SYSTEM, MARKDOWN_WRITER_SYSTEM, SAFE_MEDIA_INSTRUCTION};
use crate::llm_client::safety::{HarmBlockThreshold, SafetySettings};
use crate::llm_client::GenerationConfig;
use crate::schema::{FieldSpec, FieldType, Schema};
use crate::template::TemplateError;

pub fn course_outline() -> Result<FlowDefinition, TemplateError> {
    FlowDefinition::builder(
        "generate-course-outline",
        "Drafts a course outline from subject-matter content",
    )
    .input(
        Schema::new()
            .field(FieldSpec::string("content").min_length(1))
            .field(
                FieldSpec::integer("numModules")
                    .min(1.0)
                    .with_default(5)
                    .describe("Desired number of modules"),
            )
            .field(
                FieldSpec::string("targetAudience")
                    .with_default("Beginner")
                    .describe("Beginner, Intermediate, Expert..."),
            ),
    )
    .output(Schema::new().field(FieldSpec::string("outline").min_length(1)))
    .single(PromptSpec::text(COURSE_OUTLINE_PROMPT, "outline")?.with_system(MARKDOWN_WRITER_SYSTEM))
    .build()
}

pub fn edit_course_content() -> Result<FlowDefinition, TemplateError> {
    FlowDefinition::builder(
        "edit-course-content",
        "Applies an editing instruction to course content",
    )
    .input(
        Schema::new()
            .field(FieldSpec::string("content").min_length(1))
            .field(
                FieldSpec::string("instruction")
                    .min_length(1)
                    .describe("e.g. shorten, generate quiz questions, change style"),
            ),
    )
    .output(Schema::new().field(FieldSpec::string("editedContent")))
    .single(PromptSpec::json(EDIT_COURSE_PROMPT)?.with_system(JSON_ONLY_SYSTEM))
    .build()
}

/// Images and videos are suggested by two independent calls; either may come
/// back empty without failing the other.
pub fn relevant_multimedia() -> Result<FlowDefinition, TemplateError> {
    let image = Schema::new()
        .field(FieldSpec::string("url").describe("URL of the suggested image"))
        .field(FieldSpec::string("description"));
    let video = Schema::new()
        .field(FieldSpec::string("url").describe("URL of the suggested video"))
        .field(FieldSpec::string("title"));

    let config = GenerationConfig::default()
        .with_safety(SafetySettings::uniform(HarmBlockThreshold::BlockOnlyHigh));

    FlowDefinition::builder(
        "generate-relevant-multimedia",
        "Suggests images and videos for a lesson",
    )
    .input(Schema::new().field(FieldSpec::string("lessonContent").min_length(1)))
    .output(
        Schema::new()
            .field(FieldSpec::array("suggestedImages", FieldType::Object(image)))
            .field(FieldSpec::array("suggestedVideos", FieldType::Object(video))),
    )
    .parallel(vec![
        SubTask::new(
            "suggestedImages",
            PromptSpec::json(IMAGE_SUGGESTION_PROMPT)?
                .with_system(SAFE_MEDIA_INSTRUCTION)
                .with_config(config.clone()),
        ),
        SubTask::new(
            "suggestedVideos",
            PromptSpec::json(VIDEO_SUGGESTION_PROMPT)?
                .with_system(SAFE_MEDIA_INSTRUCTION)
                .with_config(config),
        ),
    ])
    .build()
}
