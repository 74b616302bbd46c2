// Prompt templates for the built-in flows.
// Syntax: {{field}} interpolation, {{#if (eq field "value")}} ... {{else}} ... {{/if}} branches.
// Every field referenced here must be declared in the flow's input schema;
// the flow builder rejects the definition at startup otherwise.

pub const LETTER_PROMPT: &str = r#"You are skilled at crafting personalized letters.

Write a letter tailored to the recipient, purpose, and tone below. It must sound
natural and avoid stock AI phrasing.

Recipient Name: {{recipientName}}
Purpose: {{purpose}}
Tone: {{tone}}
Letter Body: {{letterBody}}

Return a JSON object with the complete letter in the field "personalizedLetter"."#;

pub const SUMMARY_PROMPT: &str = r#"Summarize the following document, highlighting key terms and conditions in an easy-to-understand format.

Return a JSON object with the summary in the field "summary".

Document:
{{documentText}}"#;

pub const PROMPT_SUGGESTION_PROMPT: &str = r#"You specialize in prompt engineering. Rewrite the user's simple goal into a clear, detailed, and effective prompt they can give to another AI model.

The new prompt should:
- Define the AI's role and persona (e.g. "You are an expert editor...").
- Give specific, actionable instructions.
- State important constraints, including negative ones (e.g. "Do not change the author's voice").
- Provide context where necessary.

User's Goal: "{{goal}}"

Return only the suggested prompt itself."#;

pub const OCR_PROMPT: &str = r#"You are an Optical Character Recognition (OCR) tool. Extract all text from the attached image accurately, preserving line breaks and reading order.

Return only the extracted text."#;

pub const NOVEL_PROMPT: &str = r#"You are a creative co-writer helping an author with a novel.
{{#if (eq task "continue")}}
Continue the story below from exactly where it stops. Keep the voice, tense, and point of view. Do not repeat the existing text.

Story so far:
{{currentContent}}
{{else if (eq task "reword")}}
Reword the passage below. Keep its meaning and plot points; vary sentence structure and word choice.

Passage:
{{currentContent}}
{{else if (eq task "enhance")}}
Enhance the passage below with richer sensory detail, sharper dialogue, and stronger pacing, without changing what happens.

Passage:
{{currentContent}}
{{else}}
Write a new passage based on the author's request.
{{/if}}
Author's instruction: {{instruction}}

Return only the prose, in markdown."#;

pub const COURSE_OUTLINE_PROMPT: &str = r#"You are an expert course designer. Generate a course outline based on the provided content and parameters.

Content: {{content}}
Number of Modules: {{numModules}}
Target Audience: {{targetAudience}}

Outline:
"#;

pub const EDIT_COURSE_PROMPT: &str = r#"You are an editing tool that refines course content according to an instruction.

Content:
{{content}}

Instruction:
{{instruction}}

Apply the instruction to the content. Return a JSON object with the result in the field "editedContent"."#;

pub const IMAGE_SUGGESTION_PROMPT: &str = r#"Based on the following lesson content, suggest relevant images, each with a URL and a description.
Return a JSON object whose "suggestedImages" field is the list.

Lesson Content: {{lessonContent}}"#;

pub const VIDEO_SUGGESTION_PROMPT: &str = r#"Based on the following lesson content, suggest relevant YouTube videos, each with a URL and a title.
Return a JSON object whose "suggestedVideos" field is the list.

Lesson Content: {{lessonContent}}"#;

pub const BUSINESS_FORM_PROMPT: &str = r#"You generate professional business forms in markdown.

**Form Description:**
{{formDescription}}
{{#if (eq formStyle "completed")}}
**Task:** Generate a COMPLETED business form. Use the information below to fill in every relevant field so the form reads as a finished document.

**Business Information:**
{{businessInformation}}

**Recipient Information:**
{{recipientInformation}}
{{else}}
**Task:** Generate a BLANK, fill-in-the-blank business form that can be printed or filled out later. Use underscores, brackets, or blank lines (e.g. "Name: __________") for every field that needs completing.
{{/if}}
The form must be clear, well formatted, and suited to its purpose. If the description is vague, produce the most common form of that kind.
Return a JSON object with the markdown form in the field "formContent"."#;

pub const BUSINESS_IDEA_PROMPT: &str = r#"You are a business consultant who helps people turn their passions into viable businesses.

Generate 3 unique, practical business ideas DIRECTLY related to the interests below. Ideas unrelated to those interests are not acceptable: someone who loves animals gets animal-related businesses, not a bakery or a tech startup.

User Interests: {{interests}}

For each idea give a concise title, a one-paragraph description naming the target customer, and 3-5 actionable first steps."#;
