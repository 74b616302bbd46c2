//! Schema Validator: declares and enforces the shape of flow inputs and outputs.
//!
//! Validation is total: every field is checked and every violation is collected
//! into one `ValidationError`, so callers can render them together.
//! Output is a normalized object: defaults applied, numeric/boolean strings
//! coerced, unknown keys dropped, and absent optional fields set to `null`.

use std::fmt;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde_json::{json, Map, Number, Value};
use thiserror::Error;

/// Exclusive upper bound of `i64` as an `f64` (2^63).
const I64_LIMIT: f64 = 9_223_372_036_854_775_808.0;

// ────────────────────────────────────────────────────────────────────────────
// Schema model
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum FieldType {
    String,
    Number { integer: bool },
    Boolean,
    /// Closed set of allowed string values.
    Enum(Vec<String>),
    Array(Box<FieldType>),
    Object(Schema),
}

impl FieldType {
    fn name(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Number { integer: true } => "integer",
            FieldType::Number { integer: false } => "number",
            FieldType::Boolean => "boolean",
            FieldType::Enum(_) => "string",
            FieldType::Array(_) => "array",
            FieldType::Object(_) => "object",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Constraints {
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub min_items: Option<usize>,
    pub max_items: Option<usize>,
    /// String must be a `data:<mime>;base64,<payload>` URI.
    pub data_uri: bool,
}

/// A single declared field. Fields are required unless `.optional()` is called.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    pub name: String,
    pub ty: FieldType,
    pub required: bool,
    pub default: Option<Value>,
    pub constraints: Constraints,
    pub description: Option<String>,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, ty: FieldType) -> Self {
        Self {
            name: name.into(),
            ty,
            required: true,
            default: None,
            constraints: Constraints::default(),
            description: None,
        }
    }

    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::String)
    }

    pub fn number(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Number { integer: false })
    }

    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Number { integer: true })
    }

    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Boolean)
    }

    pub fn enumeration(name: impl Into<String>, allowed: &[&str]) -> Self {
        Self::new(
            name,
            FieldType::Enum(allowed.iter().map(|s| s.to_string()).collect()),
        )
    }

    pub fn array(name: impl Into<String>, items: FieldType) -> Self {
        Self::new(name, FieldType::Array(Box::new(items)))
    }

    pub fn object(name: impl Into<String>, schema: Schema) -> Self {
        Self::new(name, FieldType::Object(schema))
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn describe(mut self, text: impl Into<String>) -> Self {
        self.description = Some(text.into());
        self
    }

    pub fn min_length(mut self, n: usize) -> Self {
        self.constraints.min_length = Some(n);
        self
    }

    pub fn max_length(mut self, n: usize) -> Self {
        self.constraints.max_length = Some(n);
        self
    }

    pub fn min(mut self, n: f64) -> Self {
        self.constraints.min = Some(n);
        self
    }

    pub fn max(mut self, n: f64) -> Self {
        self.constraints.max = Some(n);
        self
    }

    pub fn min_items(mut self, n: usize) -> Self {
        self.constraints.min_items = Some(n);
        self
    }

    pub fn max_items(mut self, n: usize) -> Self {
        self.constraints.max_items = Some(n);
        self
    }

    pub fn data_uri(mut self) -> Self {
        self.constraints.data_uri = true;
        self
    }
}

/// Ordered set of field declarations for one object shape.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schema {
    fields: Vec<FieldSpec>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, spec: FieldSpec) -> Self {
        self.fields.push(spec);
        self
    }

    pub fn get(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    /// Validates `input` against this schema and returns the normalized object.
    pub fn validate(&self, input: &Value) -> Result<Map<String, Value>, ValidationError> {
        let mut violations = Vec::new();

        let normalized = match input.as_object() {
            Some(object) => self.normalize_object(object, "", &mut violations),
            None => {
                violations.push(Violation {
                    path: "$".to_string(),
                    kind: ViolationKind::WrongType { expected: "object" },
                });
                Map::new()
            }
        };

        if violations.is_empty() {
            Ok(normalized)
        } else {
            Err(ValidationError { violations })
        }
    }

    fn normalize_object(
        &self,
        object: &Map<String, Value>,
        prefix: &str,
        violations: &mut Vec<Violation>,
    ) -> Map<String, Value> {
        let mut normalized = Map::new();

        for field in &self.fields {
            let path = join_path(prefix, &field.name);

            match object.get(&field.name).filter(|v| !v.is_null()) {
                Some(value) => {
                    if let Some(value) =
                        check_value(&field.ty, &field.constraints, value, &path, violations)
                    {
                        normalized.insert(field.name.clone(), value);
                    }
                }
                None => match (&field.default, field.required) {
                    (Some(default), _) => {
                        normalized.insert(field.name.clone(), default.clone());
                    }
                    (None, true) => violations.push(Violation {
                        path,
                        kind: ViolationKind::Missing,
                    }),
                    (None, false) => {
                        normalized.insert(field.name.clone(), Value::Null);
                    }
                },
            }
        }

        normalized
    }

    /// Renders this schema in the OpenAPI-subset form used for
    /// schema-constrained generation.
    pub fn to_response_schema(&self) -> Value {
        let mut properties = Map::new();
        let mut required = Vec::new();

        for field in &self.fields {
            let mut property = type_schema(&field.ty);
            if let (Some(description), Some(object)) =
                (&field.description, property.as_object_mut())
            {
                object.insert("description".to_string(), json!(description));
            }
            properties.insert(field.name.clone(), property);
            if field.required {
                required.push(field.name.clone());
            }
        }

        json!({
            "type": "OBJECT",
            "properties": properties,
            "required": required,
        })
    }
}

fn type_schema(ty: &FieldType) -> Value {
    match ty {
        FieldType::String => json!({ "type": "STRING" }),
        FieldType::Number { integer: true } => json!({ "type": "INTEGER" }),
        FieldType::Number { integer: false } => json!({ "type": "NUMBER" }),
        FieldType::Boolean => json!({ "type": "BOOLEAN" }),
        FieldType::Enum(allowed) => json!({ "type": "STRING", "enum": allowed }),
        FieldType::Array(items) => json!({ "type": "ARRAY", "items": type_schema(items) }),
        FieldType::Object(schema) => schema.to_response_schema(),
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Value checks
// ────────────────────────────────────────────────────────────────────────────

/// Checks one value. Pushes violations and returns the normalized value,
/// or `None` when the value could not be normalized at all.
fn check_value(
    ty: &FieldType,
    constraints: &Constraints,
    value: &Value,
    path: &str,
    violations: &mut Vec<Violation>,
) -> Option<Value> {
    let mut violate = |kind: ViolationKind| {
        violations.push(Violation {
            path: path.to_string(),
            kind,
        })
    };

    match ty {
        FieldType::String => {
            let Some(text) = value.as_str() else {
                violate(ViolationKind::WrongType { expected: ty.name() });
                return None;
            };
            let length = text.chars().count();
            let mut ok = true;
            if let Some(min) = constraints.min_length.filter(|min| length < *min) {
                violate(ViolationKind::TooShort { min });
                ok = false;
            }
            if let Some(max) = constraints.max_length.filter(|max| length > *max) {
                violate(ViolationKind::TooLong { max });
                ok = false;
            }
            if constraints.data_uri && parse_data_uri(text).is_none() {
                violate(ViolationKind::NotDataUri);
                ok = false;
            }
            ok.then(|| value.clone())
        }

        FieldType::Number { integer } => {
            let number = match value {
                Value::Number(n) => n.as_f64(),
                Value::String(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
                _ => None,
            };
            let Some(number) = number else {
                violate(ViolationKind::WrongType { expected: ty.name() });
                return None;
            };
            let mut ok = true;
            if *integer && number.fract() != 0.0 {
                violate(ViolationKind::NotInteger);
                ok = false;
            } else if *integer && !(-I64_LIMIT..I64_LIMIT).contains(&number) {
                violate(ViolationKind::OutOfRange);
                ok = false;
            }
            if let Some(min) = constraints.min.filter(|min| number < *min) {
                violate(ViolationKind::BelowMinimum { min });
                ok = false;
            }
            if let Some(max) = constraints.max.filter(|max| number > *max) {
                violate(ViolationKind::AboveMaximum { max });
                ok = false;
            }
            if !ok {
                return None;
            }
            match value {
                Value::Number(_) if !*integer || value.is_i64() || value.is_u64() => {
                    Some(value.clone())
                }
                _ if *integer => Some(Value::from(number as i64)),
                _ => Number::from_f64(number).map(Value::Number),
            }
        }

        FieldType::Boolean => match value {
            Value::Bool(_) => Some(value.clone()),
            Value::String(s) if s.trim().eq_ignore_ascii_case("true") => Some(Value::Bool(true)),
            Value::String(s) if s.trim().eq_ignore_ascii_case("false") => {
                Some(Value::Bool(false))
            }
            _ => {
                violate(ViolationKind::WrongType { expected: ty.name() });
                None
            }
        },

        FieldType::Enum(allowed) => {
            let Some(text) = value.as_str() else {
                violate(ViolationKind::WrongType { expected: ty.name() });
                return None;
            };
            if allowed.iter().any(|a| a == text) {
                Some(value.clone())
            } else {
                violate(ViolationKind::NotAllowed {
                    allowed: allowed.clone(),
                });
                None
            }
        }

        FieldType::Array(items) => {
            let Some(elements) = value.as_array() else {
                violate(ViolationKind::WrongType { expected: ty.name() });
                return None;
            };
            if let Some(min) = constraints.min_items.filter(|min| elements.len() < *min) {
                violate(ViolationKind::TooFewItems { min });
            }
            if let Some(max) = constraints.max_items.filter(|max| elements.len() > *max) {
                violate(ViolationKind::TooManyItems { max });
            }
            let normalized = elements
                .iter()
                .enumerate()
                .filter_map(|(i, element)| {
                    check_value(
                        items,
                        &Constraints::default(),
                        element,
                        &format!("{path}[{i}]"),
                        violations,
                    )
                })
                .collect::<Vec<_>>();
            Some(Value::Array(normalized))
        }

        FieldType::Object(schema) => {
            let Some(object) = value.as_object() else {
                violate(ViolationKind::WrongType { expected: ty.name() });
                return None;
            };
            Some(Value::Object(schema.normalize_object(object, path, violations)))
        }
    }
}

/// Splits `data:<mime>;base64,<payload>` into its MIME type and payload.
/// Returns `None` unless the MIME type has a `type/subtype` form and the
/// payload is valid standard base64.
pub fn parse_data_uri(uri: &str) -> Option<(&str, &str)> {
    let (meta, payload) = uri.strip_prefix("data:")?.split_once(',')?;
    let mime = meta.strip_suffix(";base64")?.split(';').next()?;
    let well_formed = matches!(
        mime.split_once('/'),
        Some((kind, sub)) if !kind.is_empty() && !sub.is_empty()
    );
    if !well_formed || payload.is_empty() || BASE64.decode(payload).is_err() {
        return None;
    }
    Some((mime, payload))
}

fn join_path(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}.{name}")
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Errors
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum ViolationKind {
    Missing,
    WrongType { expected: &'static str },
    NotInteger,
    OutOfRange,
    NotDataUri,
    TooShort { min: usize },
    TooLong { max: usize },
    BelowMinimum { min: f64 },
    AboveMaximum { max: f64 },
    NotAllowed { allowed: Vec<String> },
    TooFewItems { min: usize },
    TooManyItems { max: usize },
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViolationKind::Missing => write!(f, "is required"),
            ViolationKind::WrongType { expected } => write!(f, "must be of type {expected}"),
            ViolationKind::NotInteger => write!(f, "must be a whole number"),
            ViolationKind::OutOfRange => write!(f, "is too large to be a whole number"),
            ViolationKind::NotDataUri => {
                write!(f, "must be a data URI of the form data:<mimetype>;base64,<data>")
            }
            ViolationKind::TooShort { min } => write!(f, "must be at least {min} characters"),
            ViolationKind::TooLong { max } => write!(f, "must be at most {max} characters"),
            ViolationKind::BelowMinimum { min } => write!(f, "must be at least {min}"),
            ViolationKind::AboveMaximum { max } => write!(f, "must be at most {max}"),
            ViolationKind::NotAllowed { allowed } => {
                write!(f, "must be one of: {}", allowed.join(", "))
            }
            ViolationKind::TooFewItems { min } => write!(f, "must contain at least {min} items"),
            ViolationKind::TooManyItems { max } => write!(f, "must contain at most {max} items"),
        }
    }
}

/// One failed check, addressed by a dotted path (`ideas[1].title`).
#[derive(Debug, Clone, PartialEq)]
pub struct Violation {
    pub path: String,
    pub kind: ViolationKind,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.path, self.kind)
    }
}

#[derive(Debug, Clone, Error)]
#[error("{} invalid field(s): {}", .violations.len(), summarize(.violations))]
pub struct ValidationError {
    pub violations: Vec<Violation>,
}

fn summarize(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn course_schema() -> Schema {
        Schema::new()
            .field(FieldSpec::string("content").min_length(1))
            .field(FieldSpec::integer("numModules").min(1.0).with_default(5))
            .field(FieldSpec::string("targetAudience").with_default("Beginner"))
    }

    #[test]
    fn test_aggregates_every_violation() {
        let schema = Schema::new()
            .field(FieldSpec::string("title"))
            .field(FieldSpec::string("body"))
            .field(FieldSpec::integer("count").min(1.0).max(10.0));

        let err = schema.validate(&json!({ "count": 42 })).unwrap_err();

        assert_eq!(err.violations.len(), 3);
        assert_eq!(err.violations[0].path, "title");
        assert_eq!(err.violations[0].kind, ViolationKind::Missing);
        assert_eq!(err.violations[1].path, "body");
        assert_eq!(err.violations[1].kind, ViolationKind::Missing);
        assert_eq!(err.violations[2].path, "count");
        assert_eq!(
            err.violations[2].kind,
            ViolationKind::AboveMaximum { max: 10.0 }
        );
    }

    #[test]
    fn test_applies_defaults() {
        let normalized = course_schema()
            .validate(&json!({ "content": "Intro to soil science" }))
            .unwrap();
        assert_eq!(normalized["numModules"], json!(5));
        assert_eq!(normalized["targetAudience"], json!("Beginner"));
    }

    #[test]
    fn test_null_counts_as_absent() {
        let normalized = course_schema()
            .validate(&json!({ "content": "x", "numModules": null }))
            .unwrap();
        assert_eq!(normalized["numModules"], json!(5));
    }

    #[test]
    fn test_zero_modules_rejected() {
        let err = course_schema()
            .validate(&json!({ "content": "x", "numModules": 0 }))
            .unwrap_err();
        assert_eq!(err.violations.len(), 1);
        assert_eq!(
            err.violations[0].kind,
            ViolationKind::BelowMinimum { min: 1.0 }
        );
    }

    #[test]
    fn test_coerces_numeric_string() {
        let normalized = course_schema()
            .validate(&json!({ "content": "x", "numModules": "7" }))
            .unwrap();
        assert_eq!(normalized["numModules"], json!(7));
    }

    #[test]
    fn test_rejects_fractional_integer() {
        let err = course_schema()
            .validate(&json!({ "content": "x", "numModules": 2.5 }))
            .unwrap_err();
        assert_eq!(err.violations[0].kind, ViolationKind::NotInteger);
    }

    #[test]
    fn test_rejects_integer_beyond_i64() {
        let schema = Schema::new().field(FieldSpec::integer("n").min(1.0));

        let err = schema.validate(&json!({ "n": 1e300 })).unwrap_err();
        assert_eq!(err.violations.len(), 1);
        assert_eq!(err.violations[0].kind, ViolationKind::OutOfRange);

        let err = schema.validate(&json!({ "n": "-1e19" })).unwrap_err();
        assert!(err
            .violations
            .iter()
            .any(|v| v.kind == ViolationKind::OutOfRange));
    }

    #[test]
    fn test_large_integer_within_i64_kept_exact() {
        let schema = Schema::new().field(FieldSpec::integer("n"));
        let normalized = schema
            .validate(&json!({ "n": 9_007_199_254_740_993_i64 }))
            .unwrap();
        assert_eq!(normalized["n"], json!(9_007_199_254_740_993_i64));
    }

    #[test]
    fn test_data_uri_constraint() {
        let schema = Schema::new().field(FieldSpec::string("image").data_uri());

        assert!(schema
            .validate(&json!({ "image": "data:image/png;base64,aGVsbG8=" }))
            .is_ok());

        for bad in [
            "https://example.com/a.png",
            "data:image/png,aGVsbG8=",
            "data:;base64,aGVsbG8=",
            "data:image/png;base64,",
            "data:image/png;base64,not base64!",
        ] {
            let err = schema.validate(&json!({ "image": bad })).unwrap_err();
            assert_eq!(err.violations[0].kind, ViolationKind::NotDataUri, "{bad}");
        }
    }

    #[test]
    fn test_parse_data_uri_parts() {
        assert_eq!(
            parse_data_uri("data:image/jpeg;charset=binary;base64,/9j/4A=="),
            Some(("image/jpeg", "/9j/4A=="))
        );
    }

    #[test]
    fn test_rejects_non_numeric_string() {
        let err = course_schema()
            .validate(&json!({ "content": "x", "numModules": "five" }))
            .unwrap_err();
        assert_eq!(
            err.violations[0].kind,
            ViolationKind::WrongType { expected: "integer" }
        );
    }

    #[test]
    fn test_coerces_boolean_string() {
        let schema = Schema::new().field(FieldSpec::boolean("draft"));
        let normalized = schema.validate(&json!({ "draft": "TRUE" })).unwrap();
        assert_eq!(normalized["draft"], json!(true));
    }

    #[test]
    fn test_optional_without_default_normalizes_to_null() {
        let schema = Schema::new().field(FieldSpec::string("notes").optional());
        let normalized = schema.validate(&json!({})).unwrap();
        assert_eq!(normalized.get("notes"), Some(&Value::Null));
    }

    #[test]
    fn test_unknown_keys_dropped() {
        let normalized = course_schema()
            .validate(&json!({ "content": "x", "sneaky": "value" }))
            .unwrap();
        assert!(!normalized.contains_key("sneaky"));
    }

    #[test]
    fn test_enum_rejects_unlisted_value() {
        let schema = Schema::new().field(FieldSpec::enumeration(
            "formStyle",
            &["fill-in", "completed"],
        ));
        let err = schema.validate(&json!({ "formStyle": "draft" })).unwrap_err();
        assert!(err.to_string().contains("fill-in, completed"));
    }

    #[test]
    fn test_nested_paths_reported() {
        let idea = Schema::new()
            .field(FieldSpec::string("title"))
            .field(FieldSpec::array("firstSteps", FieldType::String));
        let schema = Schema::new().field(FieldSpec::array("ideas", FieldType::Object(idea)));

        let err = schema
            .validate(&json!({
                "ideas": [
                    { "title": "Dog walking", "firstSteps": ["Get insured"] },
                    { "firstSteps": ["Print flyers", 3] }
                ]
            }))
            .unwrap_err();

        let paths: Vec<_> = err.violations.iter().map(|v| v.path.as_str()).collect();
        assert_eq!(paths, vec!["ideas[1].title", "ideas[1].firstSteps[1]"]);
    }

    #[test]
    fn test_item_count_bounds() {
        let schema = Schema::new().field(FieldSpec::array("tags", FieldType::String).min_items(2));
        let err = schema.validate(&json!({ "tags": ["one"] })).unwrap_err();
        assert_eq!(err.violations[0].kind, ViolationKind::TooFewItems { min: 2 });
    }

    #[test]
    fn test_non_object_input_rejected() {
        let err = course_schema().validate(&json!("just a string")).unwrap_err();
        assert_eq!(err.violations[0].path, "$");
    }

    #[test]
    fn test_string_length_counts_chars() {
        let schema = Schema::new().field(FieldSpec::string("name").max_length(3));
        assert!(schema.validate(&json!({ "name": "été" })).is_ok());
        assert!(schema.validate(&json!({ "name": "étés" })).is_err());
    }

    #[test]
    fn test_response_schema_shape() {
        let schema = Schema::new()
            .field(FieldSpec::string("formContent").describe("The generated form"))
            .field(FieldSpec::enumeration("style", &["a", "b"]).optional())
            .field(FieldSpec::array("steps", FieldType::String));

        let rendered = schema.to_response_schema();
        assert_eq!(rendered["type"], "OBJECT");
        assert_eq!(rendered["properties"]["formContent"]["type"], "STRING");
        assert_eq!(
            rendered["properties"]["formContent"]["description"],
            "The generated form"
        );
        assert_eq!(rendered["properties"]["style"]["enum"], json!(["a", "b"]));
        assert_eq!(rendered["properties"]["steps"]["items"]["type"], "STRING");
        assert_eq!(rendered["required"], json!(["formContent", "steps"]));
    }
}
