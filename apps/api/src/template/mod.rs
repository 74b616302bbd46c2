//! Template Renderer: expands a prompt template against a normalized input object.
//!
//! Templates are authored in a small mustache-like syntax (see `parser`) and
//! held as a tree of `Segment`s. Substitution is literal: interpolated values
//! are never themselves expanded.

mod parser;

use std::collections::BTreeSet;

use serde_json::{Map, Value};
use thiserror::Error;

use crate::schema::Schema;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TemplateError {
    #[error("Template syntax error at byte {offset}: {message}")]
    Parse { offset: usize, message: String },

    #[error("Template references field '{0}' which the input schema does not declare")]
    UndeclaredField(String),

    #[error("Field '{0}' is absent from the validated input")]
    MissingField(String),

    #[error("Invalid flow definition: {0}")]
    Definition(String),
}

/// Condition selecting one branch of a `Segment::Conditional`.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// `{{#if field}}`: present, non-empty, non-false, non-zero.
    Truthy(String),
    /// `{{#if (eq field "value")}}`: rendered text of the field equals `value`.
    Equals { field: String, value: String },
}

impl Predicate {
    pub fn field(&self) -> &str {
        match self {
            Predicate::Truthy(field) => field,
            Predicate::Equals { field, .. } => field,
        }
    }

    pub fn evaluate(&self, input: &Map<String, Value>) -> Result<bool, TemplateError> {
        let value = input
            .get(self.field())
            .ok_or_else(|| TemplateError::MissingField(self.field().to_string()))?;

        Ok(match self {
            Predicate::Truthy(_) => is_truthy(value),
            Predicate::Equals { value: expected, .. } => value_text(value) == *expected,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    Literal(String),
    Field(String),
    /// `otherwise` is always present (possibly empty), so exactly one branch renders.
    Conditional {
        predicate: Predicate,
        then: Vec<Segment>,
        otherwise: Vec<Segment>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    segments: Vec<Segment>,
}

impl Template {
    pub fn new(segments: Vec<Segment>) -> Self {
        Self { segments }
    }

    pub fn parse(source: &str) -> Result<Self, TemplateError> {
        parser::parse(source).map(Self::new)
    }

    /// Every field used by an interpolation or a predicate, anywhere in the tree.
    pub fn referenced_fields(&self) -> BTreeSet<&str> {
        let mut fields = BTreeSet::new();
        collect_fields(&self.segments, &mut fields);
        fields
    }

    /// Fails on the first referenced field the schema does not declare.
    pub fn ensure_declared(&self, schema: &Schema) -> Result<(), TemplateError> {
        match self.referenced_fields().into_iter().find(|f| !schema.contains(f)) {
            Some(field) => Err(TemplateError::UndeclaredField(field.to_string())),
            None => Ok(()),
        }
    }

    pub fn render(&self, input: &Map<String, Value>) -> Result<String, TemplateError> {
        let mut out = String::new();
        render_segments(&self.segments, input, &mut out)?;
        Ok(out)
    }
}

fn collect_fields<'a>(segments: &'a [Segment], fields: &mut BTreeSet<&'a str>) {
    for segment in segments {
        match segment {
            Segment::Literal(_) => {}
            Segment::Field(name) => {
                fields.insert(name.as_str());
            }
            Segment::Conditional {
                predicate,
                then,
                otherwise,
            } => {
                fields.insert(predicate.field());
                collect_fields(then, fields);
                collect_fields(otherwise, fields);
            }
        }
    }
}

fn render_segments(
    segments: &[Segment],
    input: &Map<String, Value>,
    out: &mut String,
) -> Result<(), TemplateError> {
    for segment in segments {
        match segment {
            Segment::Literal(text) => out.push_str(text),
            Segment::Field(name) => {
                let value = input
                    .get(name)
                    .ok_or_else(|| TemplateError::MissingField(name.clone()))?;
                out.push_str(&value_text(value));
            }
            Segment::Conditional {
                predicate,
                then,
                otherwise,
            } => {
                let branch = if predicate.evaluate(input)? { then } else { otherwise };
                render_segments(branch, input, out)?;
            }
        }
    }
    Ok(())
}

/// Text form of a value as it appears in a prompt. `null` renders as empty.
fn value_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.trim().is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldSpec;
    use serde_json::json;

    fn input(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_interpolates_in_order() {
        let template = Template::parse("Dear {{recipientName}}, re: {{{purpose}}}.").unwrap();
        let rendered = template
            .render(&input(json!({ "recipientName": "Ada", "purpose": "thanks" })))
            .unwrap();
        assert_eq!(rendered, "Dear Ada, re: thanks.");
    }

    #[test]
    fn test_null_renders_empty_not_undefined() {
        let template = Template::parse("[{{notes}}]").unwrap();
        let rendered = template.render(&input(json!({ "notes": null }))).unwrap();
        assert_eq!(rendered, "[]");
    }

    #[test]
    fn test_missing_field_is_an_error() {
        let template = Template::parse("{{notes}}").unwrap();
        let err = template.render(&Map::new()).unwrap_err();
        assert_eq!(err, TemplateError::MissingField("notes".to_string()));
    }

    #[test]
    fn test_substitution_is_literal() {
        let template = Template::parse("Body: {{body}}").unwrap();
        let rendered = template
            .render(&input(json!({ "body": "{{secret}} stays as typed" })))
            .unwrap();
        assert_eq!(rendered, "Body: {{secret}} stays as typed");
    }

    #[test]
    fn test_numbers_render_without_quotes() {
        let template = Template::parse("Modules: {{n}}").unwrap();
        let rendered = template.render(&input(json!({ "n": 5 }))).unwrap();
        assert_eq!(rendered, "Modules: 5");
    }

    #[test]
    fn test_equality_branch_selects_exactly_one() {
        let template =
            Template::parse(r#"{{#if (eq style "completed")}}FILLED{{else}}BLANK{{/if}}"#)
                .unwrap();
        assert_eq!(
            template.render(&input(json!({ "style": "completed" }))).unwrap(),
            "FILLED"
        );
        assert_eq!(
            template.render(&input(json!({ "style": "fill-in" }))).unwrap(),
            "BLANK"
        );
    }

    #[test]
    fn test_if_without_else_renders_nothing_when_false() {
        let template = Template::parse("a{{#if extra}}-{{extra}}{{/if}}b").unwrap();
        assert_eq!(template.render(&input(json!({ "extra": "" }))).unwrap(), "ab");
        assert_eq!(
            template.render(&input(json!({ "extra": "x" }))).unwrap(),
            "a-xb"
        );
    }

    #[test]
    fn test_else_if_chain() {
        let template = Template::parse(
            r#"{{#if (eq task "continue")}}C{{else if (eq task "reword")}}R{{else}}G{{/if}}"#,
        )
        .unwrap();
        let render = |task: &str| template.render(&input(json!({ "task": task }))).unwrap();
        assert_eq!(render("continue"), "C");
        assert_eq!(render("reword"), "R");
        assert_eq!(render("generate"), "G");
    }

    #[test]
    fn test_referenced_fields_include_predicates() {
        let template = Template::parse(
            r#"{{a}}{{#if (eq b "x")}}{{c}}{{else}}{{#if d}}{{e}}{{/if}}{{/if}}"#,
        )
        .unwrap();
        let fields: Vec<_> = template.referenced_fields().into_iter().collect();
        assert_eq!(fields, vec!["a", "b", "c", "d", "e"]);
    }

    #[test]
    fn test_ensure_declared_flags_unknown_field() {
        let schema = Schema::new().field(FieldSpec::string("goal"));
        let template = Template::parse("{{goal}} {{gaol}}").unwrap();
        assert_eq!(
            template.ensure_declared(&schema).unwrap_err(),
            TemplateError::UndeclaredField("gaol".to_string())
        );
    }
}
