// Shared prompt fragments.
// Each flow module defines its own templates in catalogue/prompts.rs;
// this file holds the system-level instructions several flows reuse.

/// System prompt for flows whose output is a markdown document.
pub const MARKDOWN_WRITER_SYSTEM: &str = "You are a careful professional writer. \
    Respond in clean markdown. \
    Do NOT use HTML. \
    Do NOT add preambles such as 'Sure, here is'.";

/// System prompt for flows that return structured JSON.
pub const JSON_ONLY_SYSTEM: &str = "You are a precise, structured assistant. \
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON value. \
    Do NOT use markdown code fences.";

/// Appended to suggestion prompts that may surface third-party media.
pub const SAFE_MEDIA_INSTRUCTION: &str = "Do not include any resources that would be \
    considered offensive, dangerous, or illegal.";
