//! Static flow declarations: schemas, prompt(s), invocation mode, field rules.
//!
//! Definitions are built once at startup. `FlowBuilder::build` checks every
//! cross-reference (template fields, rule fields, sub-task labels) so that a
//! broken definition fails at boot instead of mid-request.

use serde_json::{Map, Value};

use crate::errors::FlowError;
use crate::llm_client::{GenerationConfig, InlineMedia, InvocationRequest, OutputMode};
use crate::schema::{parse_data_uri, FieldType, Schema, ValidationError, Violation, ViolationKind};
use crate::template::{Predicate, Template, TemplateError};

/// How the model's answer becomes (part of) the flow output.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseFormat {
    /// Schema-constrained JSON.
    Json,
    /// Free text, stored under the named output field.
    TextField(String),
}

/// One prompt: optional system instruction, template, attached media, knobs,
/// answer format.
#[derive(Debug, Clone)]
pub struct PromptSpec {
    pub system: Option<String>,
    pub template: Template,
    /// Input field holding a data URI sent as inline media.
    pub media: Option<String>,
    pub config: GenerationConfig,
    pub format: ResponseFormat,
}

impl PromptSpec {
    pub fn json(template: &str) -> Result<Self, TemplateError> {
        Ok(Self {
            system: None,
            template: Template::parse(template)?,
            media: None,
            config: GenerationConfig::default(),
            format: ResponseFormat::Json,
        })
    }

    pub fn text(template: &str, field: &str) -> Result<Self, TemplateError> {
        Ok(Self {
            system: None,
            template: Template::parse(template)?,
            media: None,
            config: GenerationConfig::default(),
            format: ResponseFormat::TextField(field.to_string()),
        })
    }

    pub fn with_system(mut self, system: &str) -> Self {
        self.system = Some(system.to_string());
        self
    }

    pub fn with_config(mut self, config: GenerationConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_media(mut self, field: &str) -> Self {
        self.media = Some(field.to_string());
        self
    }

    /// Renders the template and packages the request for the invoker.
    pub fn request(
        &self,
        input: &Map<String, Value>,
        expected: &Schema,
    ) -> Result<InvocationRequest, TemplateError> {
        let media = match &self.media {
            Some(field) => vec![inline_media(input, field)?],
            None => Vec::new(),
        };

        Ok(InvocationRequest {
            prompt: self.template.render(input)?,
            media,
            system: self.system.clone(),
            config: self.config.clone(),
            output: match self.format {
                ResponseFormat::Json => OutputMode::Structured(expected.clone()),
                ResponseFormat::TextField(_) => OutputMode::Text,
            },
        })
    }
}

fn inline_media(input: &Map<String, Value>, field: &str) -> Result<InlineMedia, TemplateError> {
    let uri = input
        .get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| TemplateError::MissingField(field.to_string()))?;
    let (mime_type, data) = parse_data_uri(uri).ok_or_else(|| {
        TemplateError::Definition(format!("media field '{field}' does not hold a data URI"))
    })?;
    Ok(InlineMedia {
        mime_type: mime_type.to_string(),
        data: data.to_string(),
    })
}

/// An independent sub-call of a parallel-multi flow, filling one output field.
#[derive(Debug, Clone)]
pub struct SubTask {
    pub label: String,
    pub prompt: PromptSpec,
}

impl SubTask {
    pub fn new(label: &str, prompt: PromptSpec) -> Self {
        Self {
            label: label.to_string(),
            prompt,
        }
    }
}

#[derive(Debug, Clone)]
pub enum InvocationMode {
    Single(PromptSpec),
    /// Sub-tasks run concurrently; a failed one contributes an empty value.
    ParallelMulti(Vec<SubTask>),
}

impl InvocationMode {
    pub fn label(&self) -> &'static str {
        match self {
            InvocationMode::Single(_) => "single",
            InvocationMode::ParallelMulti(_) => "parallel-multi",
        }
    }
}

/// When `when` holds on the validated input, `clear` fields are reset to null
/// before any prompt is rendered.
#[derive(Debug, Clone)]
pub struct FieldRule {
    pub when: Predicate,
    pub clear: Vec<String>,
}

/// Unless `unless` holds, `fields` must carry a non-empty value.
#[derive(Debug, Clone)]
pub struct RequiredRule {
    pub unless: Predicate,
    pub fields: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct FlowDefinition {
    name: String,
    description: String,
    input_schema: Schema,
    output_schema: Schema,
    mode: InvocationMode,
    rules: Vec<FieldRule>,
    requirements: Vec<RequiredRule>,
}

impl FlowDefinition {
    pub fn builder(name: &str, description: &str) -> FlowBuilder {
        FlowBuilder {
            name: name.to_string(),
            description: description.to_string(),
            input_schema: Schema::new(),
            output_schema: Schema::new(),
            mode: None,
            rules: Vec::new(),
            requirements: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn input_schema(&self) -> &Schema {
        &self.input_schema
    }

    pub fn output_schema(&self) -> &Schema {
        &self.output_schema
    }

    pub fn mode(&self) -> &InvocationMode {
        &self.mode
    }

    /// Checks fields that are optional in the schema but required by the
    /// branch the input selects. Runs on the validated input.
    pub fn check_requirements(&self, input: &Map<String, Value>) -> Result<(), FlowError> {
        let mut violations = Vec::new();
        for rule in &self.requirements {
            if rule.unless.evaluate(input)? {
                continue;
            }
            for field in &rule.fields {
                let present = match input.get(field) {
                    Some(Value::String(s)) => !s.trim().is_empty(),
                    Some(Value::Null) | None => false,
                    Some(_) => true,
                };
                if !present {
                    violations.push(Violation {
                        path: field.clone(),
                        kind: ViolationKind::Missing,
                    });
                }
            }
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { violations }.into())
        }
    }

    /// Clears fields that do not apply to the branch the input selects.
    pub fn apply_rules(&self, input: &mut Map<String, Value>) -> Result<(), TemplateError> {
        for rule in &self.rules {
            if rule.when.evaluate(input)? {
                for field in &rule.clear {
                    input.insert(field.clone(), Value::Null);
                }
            }
        }
        Ok(())
    }

    /// Schema for the single output field a sub-task fills.
    pub fn slot_schema(&self, label: &str) -> Option<Schema> {
        self.output_schema
            .get(label)
            .map(|spec| Schema::new().field(spec.clone()))
    }
}

/// Placeholder used when a sub-task fails.
pub fn empty_value(ty: &FieldType) -> Value {
    match ty {
        FieldType::Array(_) => Value::Array(Vec::new()),
        FieldType::Object(_) => Value::Object(Map::new()),
        FieldType::String => Value::String(String::new()),
        FieldType::Number { .. } | FieldType::Boolean | FieldType::Enum(_) => Value::Null,
    }
}

pub struct FlowBuilder {
    name: String,
    description: String,
    input_schema: Schema,
    output_schema: Schema,
    mode: Option<InvocationMode>,
    rules: Vec<FieldRule>,
    requirements: Vec<RequiredRule>,
}

impl FlowBuilder {
    pub fn input(mut self, schema: Schema) -> Self {
        self.input_schema = schema;
        self
    }

    pub fn output(mut self, schema: Schema) -> Self {
        self.output_schema = schema;
        self
    }

    pub fn single(mut self, prompt: PromptSpec) -> Self {
        self.mode = Some(InvocationMode::Single(prompt));
        self
    }

    pub fn parallel(mut self, subtasks: Vec<SubTask>) -> Self {
        self.mode = Some(InvocationMode::ParallelMulti(subtasks));
        self
    }

    pub fn clear_when(mut self, when: Predicate, clear: &[&str]) -> Self {
        self.rules.push(FieldRule {
            when,
            clear: clear.iter().map(|f| f.to_string()).collect(),
        });
        self
    }

    pub fn require_unless(mut self, unless: Predicate, fields: &[&str]) -> Self {
        self.requirements.push(RequiredRule {
            unless,
            fields: fields.iter().map(|f| f.to_string()).collect(),
        });
        self
    }

    pub fn build(self) -> Result<FlowDefinition, TemplateError> {
        let defect = |message: String| TemplateError::Definition(format!("{}: {message}", self.name));

        let mode = self
            .mode
            .clone()
            .ok_or_else(|| defect("no prompt declared".to_string()))?;

        let prompts: Vec<&PromptSpec> = match &mode {
            InvocationMode::Single(prompt) => vec![prompt],
            InvocationMode::ParallelMulti(subtasks) => {
                if subtasks.is_empty() {
                    return Err(defect("parallel flow without sub-tasks".to_string()));
                }
                for subtask in subtasks {
                    if !self.output_schema.contains(&subtask.label) {
                        return Err(defect(format!(
                            "sub-task '{}' fills no declared output field",
                            subtask.label
                        )));
                    }
                }
                subtasks.iter().map(|s| &s.prompt).collect()
            }
        };

        for prompt in prompts {
            prompt.template.ensure_declared(&self.input_schema)?;
            if let Some(field) = &prompt.media {
                let declared = self.input_schema.get(field).ok_or_else(|| {
                    TemplateError::UndeclaredField(field.clone())
                })?;
                if !declared.constraints.data_uri {
                    return Err(defect(format!("media field '{field}' is not a data URI field")));
                }
            }
            if let ResponseFormat::TextField(field) = &prompt.format {
                if !self.output_schema.contains(field) {
                    return Err(defect(format!("text output field '{field}' not declared")));
                }
            }
        }

        let rule_fields = self
            .rules
            .iter()
            .flat_map(|r| {
                std::iter::once(r.when.field()).chain(r.clear.iter().map(|f| f.as_str()))
            })
            .chain(self.requirements.iter().flat_map(|r| {
                std::iter::once(r.unless.field()).chain(r.fields.iter().map(|f| f.as_str()))
            }));
        for field in rule_fields {
            if !self.input_schema.contains(field) {
                return Err(TemplateError::UndeclaredField(field.to_string()));
            }
        }

        Ok(FlowDefinition {
            name: self.name,
            description: self.description,
            input_schema: self.input_schema,
            output_schema: self.output_schema,
            mode,
            rules: self.rules,
            requirements: self.requirements,
        })
    }
}
