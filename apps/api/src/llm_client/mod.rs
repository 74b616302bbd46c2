/// LLM Client: the single point of entry for all generation calls in Inkwell.
///
/// ARCHITECTURAL RULE: flows never talk to the provider directly. They hand an
/// `InvocationRequest` to a `ModelInvoker`; `LlmClient` is the production one.
///
/// The invoker makes exactly one attempt per call. Retry policy lives in the
/// flow runner.
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::Config;
use crate::schema::Schema;

pub mod prompts;
pub mod safety;

use safety::{SafetySetting, SafetySettings};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum InvokeError {
    /// Network, auth, quota, or deadline failure. Retryable by the caller.
    #[error("Generation capability unavailable: {0}")]
    CapabilityUnavailable(String),

    /// The provider's safety filter rejected the prompt or the answer.
    #[error("Content blocked by safety filter: {0}")]
    ContentBlocked(String),

    /// The provider answered, but not in the expected shape.
    #[error("Model returned malformed output: {0}")]
    MalformedOutput(String),
}

impl From<reqwest::Error> for InvokeError {
    fn from(e: reqwest::Error) -> Self {
        InvokeError::CapabilityUnavailable(e.to_string())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Invocation contract
// ────────────────────────────────────────────────────────────────────────────

/// Optional knobs forwarded to the provider.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerationConfig {
    pub safety: SafetySettings,
    pub temperature: Option<f32>,
    pub max_output_tokens: Option<u32>,
}

impl GenerationConfig {
    pub fn with_safety(mut self, safety: SafetySettings) -> Self {
        self.safety = safety;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_output_tokens(mut self, max_output_tokens: u32) -> Self {
        self.max_output_tokens = Some(max_output_tokens);
        self
    }
}

/// Binary input sent alongside the prompt (e.g. a photographed document).
#[derive(Debug, Clone, PartialEq)]
pub struct InlineMedia {
    pub mime_type: String,
    /// Base64-encoded bytes.
    pub data: String,
}

/// What the caller expects back.
#[derive(Debug, Clone, PartialEq)]
pub enum OutputMode {
    /// Free text, returned untouched.
    Text,
    /// A JSON value conforming to the schema (schema-constrained generation).
    Structured(Schema),
}

#[derive(Debug, Clone, PartialEq)]
pub struct InvocationRequest {
    pub prompt: String,
    pub media: Vec<InlineMedia>,
    pub system: Option<String>,
    pub config: GenerationConfig,
    pub output: OutputMode,
}

#[derive(Debug, Clone, PartialEq)]
pub enum InvocationOutput {
    Text(String),
    Structured(Value),
}

/// The seam between flow orchestration and the generation capability.
///
/// Carried by the flow runner as `Arc<dyn ModelInvoker>`.
#[async_trait]
pub trait ModelInvoker: Send + Sync {
    async fn invoke(&self, request: &InvocationRequest) -> Result<InvocationOutput, InvokeError>;
}

// ────────────────────────────────────────────────────────────────────────────
// Gemini wire types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    safety_settings: Option<Vec<SafetySetting>>,
    generation_config: GenerationParams,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Part<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData<'a>>,
}

impl<'a> Part<'a> {
    fn text(text: &'a str) -> Self {
        Self {
            text: Some(text),
            inline_data: None,
        }
    }

    fn media(media: &'a InlineMedia) -> Self {
        Self {
            text: None,
            inline_data: Some(InlineData {
                mime_type: &media.mime_type,
                data: &media.data,
            }),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData<'a> {
    mime_type: &'a str,
    data: &'a str,
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_schema: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    pub prompt_feedback: Option<PromptFeedback>,
    pub usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub content: Option<CandidateContent>,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CandidateContent {
    #[serde(default)]
    pub parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
pub struct ResponsePart {
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptFeedback {
    pub block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageMetadata {
    #[serde(default)]
    pub prompt_token_count: u32,
    #[serde(default)]
    pub candidates_token_count: u32,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

/// Finish reasons that mean the provider withheld the answer on policy grounds.
const BLOCKING_FINISH_REASONS: &[&str] = &["SAFETY", "BLOCKLIST", "PROHIBITED_CONTENT", "SPII"];

impl GenerateContentResponse {
    /// Concatenated text of the first candidate's parts.
    pub fn text(&self) -> Option<String> {
        let parts = &self.candidates.first()?.content.as_ref()?.parts;
        let text: String = parts.iter().filter_map(|p| p.text.as_deref()).collect();
        (!text.trim().is_empty()).then_some(text)
    }

    /// Why the provider blocked this exchange, if it did.
    pub fn block_reason(&self) -> Option<String> {
        if let Some(reason) = self
            .prompt_feedback
            .as_ref()
            .and_then(|f| f.block_reason.clone())
        {
            return Some(format!("prompt blocked ({reason})"));
        }
        self.candidates
            .first()
            .and_then(|c| c.finish_reason.as_deref())
            .filter(|reason| BLOCKING_FINISH_REASONS.contains(reason))
            .map(|reason| format!("response withheld ({reason})"))
    }
}

/// Turns a successful HTTP response body into the caller's expected output.
fn interpret_response(
    response: &GenerateContentResponse,
    output: &OutputMode,
) -> Result<InvocationOutput, InvokeError> {
    if let Some(reason) = response.block_reason() {
        return Err(InvokeError::ContentBlocked(reason));
    }

    let text = response
        .text()
        .ok_or_else(|| InvokeError::MalformedOutput("response contained no text".to_string()))?;

    match output {
        OutputMode::Text => Ok(InvocationOutput::Text(text)),
        OutputMode::Structured(_) => serde_json::from_str(strip_json_fences(&text))
            .map(InvocationOutput::Structured)
            .map_err(|e| InvokeError::MalformedOutput(format!("response was not valid JSON: {e}"))),
    }
}

// ────────────────────────────────────────────────────────────────────────────
// LlmClient
// ────────────────────────────────────────────────────────────────────────────

/// Production invoker backed by the Gemini `generateContent` REST endpoint.
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    api_key: String,
    api_base: String,
    model: String,
}

impl LlmClient {
    pub fn new(config: &Config) -> Self {
        Self {
            client: Client::builder()
                .timeout(config.invocation_timeout)
                .build()
                .expect("Failed to build HTTP client"),
            api_key: config.gemini_api_key.clone(),
            api_base: config.gemini_api_base.trim_end_matches('/').to_string(),
            model: config.gemini_model.clone(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.api_base, self.model)
    }
}

fn build_request(request: &InvocationRequest) -> GenerateContentRequest<'_> {
    let mut params = GenerationParams {
        temperature: request.config.temperature,
        max_output_tokens: request.config.max_output_tokens,
        ..GenerationParams::default()
    };
    if let OutputMode::Structured(schema) = &request.output {
        params.response_mime_type = Some("application/json");
        params.response_schema = Some(schema.to_response_schema());
    }

    let parts = std::iter::once(Part::text(&request.prompt))
        .chain(request.media.iter().map(Part::media))
        .collect();

    let safety = &request.config.safety;

    GenerateContentRequest {
        contents: vec![Content {
            role: Some("user"),
            parts,
        }],
        system_instruction: request.system.as_deref().map(|text| Content {
            role: None,
            parts: vec![Part::text(text)],
        }),
        safety_settings: (!safety.is_empty()).then(|| safety.to_wire()),
        generation_config: params,
    }
}

#[async_trait]
impl ModelInvoker for LlmClient {
    async fn invoke(&self, request: &InvocationRequest) -> Result<InvocationOutput, InvokeError> {
        let body = build_request(request);

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiError>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            warn!("Generation API returned {}: {}", status, message);
            return Err(InvokeError::CapabilityUnavailable(format!(
                "status {}: {}",
                status.as_u16(),
                message
            )));
        }

        let parsed: GenerateContentResponse = response.json().await.map_err(|e| {
            InvokeError::MalformedOutput(format!("unreadable response envelope: {e}"))
        })?;

        if let Some(usage) = &parsed.usage_metadata {
            debug!(
                "Generation call succeeded: prompt_tokens={}, output_tokens={}",
                usage.prompt_token_count, usage.candidates_token_count
            );
        }

        interpret_response(&parsed, &request.output)
    }
}

/// Strips ```json ... ``` or ``` ... ``` code fences from model output.
fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    if let Some(stripped) = text.strip_prefix("```json") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else if let Some(stripped) = text.strip_prefix("```") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else {
        text
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Test double
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
pub mod testing {
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    use super::*;

    struct Route {
        needle: String,
        replies: Mutex<VecDeque<Result<InvocationOutput, InvokeError>>>,
        delay: Option<Duration>,
    }

    /// Replies by matching a substring of the prompt. Each route hands out its
    /// replies in order and repeats the last one once the queue runs down.
    #[derive(Default)]
    pub struct ScriptedInvoker {
        routes: Vec<Route>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedInvoker {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn on(
            mut self,
            needle: &str,
            replies: Vec<Result<InvocationOutput, InvokeError>>,
        ) -> Self {
            self.routes.push(Route {
                needle: needle.to_string(),
                replies: Mutex::new(replies.into()),
                delay: None,
            });
            self
        }

        pub fn on_slow(
            mut self,
            needle: &str,
            delay: Duration,
            reply: Result<InvocationOutput, InvokeError>,
        ) -> Self {
            self.routes.push(Route {
                needle: needle.to_string(),
                replies: Mutex::new(vec![reply].into()),
                delay: Some(delay),
            });
            self
        }

        pub fn prompts(&self) -> Vec<String> {
            self.prompts.lock().unwrap().clone()
        }

        pub fn calls(&self) -> usize {
            self.prompts.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl ModelInvoker for ScriptedInvoker {
        async fn invoke(
            &self,
            request: &InvocationRequest,
        ) -> Result<InvocationOutput, InvokeError> {
            self.prompts.lock().unwrap().push(request.prompt.clone());

            let Some(route) = self
                .routes
                .iter()
                .find(|r| request.prompt.contains(&r.needle))
            else {
                return Err(InvokeError::MalformedOutput(
                    "no scripted reply for prompt".to_string(),
                ));
            };

            if let Some(delay) = route.delay {
                tokio::time::sleep(delay).await;
            }

            let mut replies = route.replies.lock().unwrap();
            if replies.len() > 1 {
                replies.pop_front().unwrap()
            } else {
                replies.front().cloned().unwrap()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::safety::HarmBlockThreshold;
    use crate::schema::FieldSpec;
    use serde_json::json;

    fn response(value: Value) -> GenerateContentResponse {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_strip_json_fences_with_json_tag() {
        let input = "```json\n{\"key\": \"value\"}\n```";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_strip_json_fences_without_tag() {
        let input = "```\n[1, 2]\n```";
        assert_eq!(strip_json_fences(input), "[1, 2]");
    }

    #[test]
    fn test_strip_json_fences_no_fences() {
        let input = "{\"key\": \"value\"}";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_structured_request_carries_schema_and_safety() {
        let request = InvocationRequest {
            prompt: "Summarize this".to_string(),
            media: Vec::new(),
            system: Some("Be brief".to_string()),
            config: GenerationConfig::default()
                .with_safety(SafetySettings::uniform(HarmBlockThreshold::BlockOnlyHigh)),
            output: OutputMode::Structured(Schema::new().field(FieldSpec::string("summary"))),
        };

        let body = serde_json::to_value(build_request(&request)).unwrap();

        assert_eq!(body["contents"][0]["role"], "user");
        assert_eq!(body["contents"][0]["parts"][0]["text"], "Summarize this");
        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "Be brief");
        assert_eq!(body["safetySettings"].as_array().unwrap().len(), 4);
        assert_eq!(
            body["generationConfig"]["responseMimeType"],
            "application/json"
        );
        assert_eq!(
            body["generationConfig"]["responseSchema"]["properties"]["summary"]["type"],
            "STRING"
        );
    }

    #[test]
    fn test_text_request_omits_optional_sections() {
        let request = InvocationRequest {
            prompt: "Hello".to_string(),
            media: Vec::new(),
            system: None,
            config: GenerationConfig::default(),
            output: OutputMode::Text,
        };

        let body = serde_json::to_value(build_request(&request)).unwrap();

        assert!(body.get("systemInstruction").is_none());
        assert!(body.get("safetySettings").is_none());
        assert_eq!(body["generationConfig"], json!({}));
    }

    #[test]
    fn test_media_rides_next_to_prompt() {
        let request = InvocationRequest {
            prompt: "Extract the text".to_string(),
            media: vec![InlineMedia {
                mime_type: "image/png".to_string(),
                data: "aGVsbG8=".to_string(),
            }],
            system: None,
            config: GenerationConfig::default().with_max_output_tokens(2048),
            output: OutputMode::Text,
        };

        let body = serde_json::to_value(build_request(&request)).unwrap();

        assert_eq!(
            body["contents"][0]["parts"],
            json!([
                { "text": "Extract the text" },
                { "inlineData": { "mimeType": "image/png", "data": "aGVsbG8=" } }
            ])
        );
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 2048);
    }

    #[test]
    fn test_interpret_structured_output() {
        let r = response(json!({
            "candidates": [{
                "content": { "parts": [{ "text": "```json\n{\"summary\": \"short\"}\n```" }] },
                "finishReason": "STOP"
            }]
        }));
        let output = interpret_response(&r, &OutputMode::Structured(Schema::new())).unwrap();
        assert_eq!(output, InvocationOutput::Structured(json!({ "summary": "short" })));
    }

    #[test]
    fn test_interpret_text_joins_parts() {
        let r = response(json!({
            "candidates": [{
                "content": { "parts": [{ "text": "Dear " }, { "text": "Ada" }] }
            }]
        }));
        let output = interpret_response(&r, &OutputMode::Text).unwrap();
        assert_eq!(output, InvocationOutput::Text("Dear Ada".to_string()));
    }

    #[test]
    fn test_prompt_block_is_content_blocked() {
        let r = response(json!({ "promptFeedback": { "blockReason": "SAFETY" } }));
        let err = interpret_response(&r, &OutputMode::Text).unwrap_err();
        assert!(matches!(err, InvokeError::ContentBlocked(_)));
    }

    #[test]
    fn test_safety_finish_reason_is_content_blocked() {
        let r = response(json!({
            "candidates": [{ "finishReason": "SAFETY" }]
        }));
        let err = interpret_response(&r, &OutputMode::Text).unwrap_err();
        assert!(matches!(err, InvokeError::ContentBlocked(_)));
    }

    #[test]
    fn test_invalid_json_is_malformed() {
        let r = response(json!({
            "candidates": [{ "content": { "parts": [{ "text": "not json at all" }] } }]
        }));
        let err = interpret_response(&r, &OutputMode::Structured(Schema::new())).unwrap_err();
        assert!(matches!(err, InvokeError::MalformedOutput(_)));
    }

    #[test]
    fn test_empty_candidates_is_malformed() {
        let r = response(json!({ "candidates": [] }));
        let err = interpret_response(&r, &OutputMode::Text).unwrap_err();
        assert!(matches!(err, InvokeError::MalformedOutput(_)));
    }
}
