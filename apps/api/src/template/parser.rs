//! Parser for the prompt template syntax.
//!
//! Recognised tags:
//! - `{{field}}` and `{{{field}}}` interpolate a field.
//! - `{{#if field}}` / `{{#if (eq field "value")}}` open a conditional.
//! - `{{else if ...}}`, `{{else}}` and `{{/if}}` continue or close it.
//!
//! Anything outside `{{ }}` is literal text.

use std::iter::Peekable;
use std::vec::IntoIter;

use super::{Predicate, Segment, TemplateError};

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Text(String),
    Field(String),
    If(Predicate),
    ElseIf(Predicate),
    Else,
    EndIf,
}

/// How a block of segments was terminated.
enum BlockEnd {
    Eof,
    ElseIf(Predicate),
    Else,
    EndIf,
}

pub(super) fn parse(source: &str) -> Result<Vec<Segment>, TemplateError> {
    let tokens = tokenize(source)?;
    let mut parser = Parser {
        tokens: tokens.into_iter().peekable(),
    };

    let (segments, end) = parser.parse_block()?;
    match end {
        BlockEnd::Eof => Ok(segments),
        BlockEnd::Else | BlockEnd::ElseIf(_) => Err(syntax(source.len(), "{{else}} outside of {{#if}}")),
        BlockEnd::EndIf => Err(syntax(source.len(), "{{/if}} without a matching {{#if}}")),
    }
}

fn syntax(offset: usize, message: &str) -> TemplateError {
    TemplateError::Parse {
        offset,
        message: message.to_string(),
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tokenizer
// ────────────────────────────────────────────────────────────────────────────

fn tokenize(source: &str) -> Result<Vec<(usize, Token)>, TemplateError> {
    let mut tokens = Vec::new();
    let mut cursor = 0;

    while let Some(found) = source[cursor..].find("{{") {
        let open = cursor + found;
        if open > cursor {
            tokens.push((cursor, Token::Text(source[cursor..open].to_string())));
        }

        let (body, close_len, triple) = if source[open..].starts_with("{{{") {
            (open + 3, 3, true)
        } else {
            (open + 2, 2, false)
        };
        let closer = if triple { "}}}" } else { "}}" };

        let Some(length) = source[body..].find(closer) else {
            return Err(syntax(open, "unclosed tag"));
        };
        let tag = source[body..body + length].trim();
        cursor = body + length + close_len;

        let token = if triple {
            Token::Field(field_name(tag, open)?)
        } else {
            classify(tag, open)?
        };
        tokens.push((open, token));
    }

    if cursor < source.len() {
        tokens.push((cursor, Token::Text(source[cursor..].to_string())));
    }

    Ok(tokens)
}

fn classify(tag: &str, offset: usize) -> Result<Token, TemplateError> {
    if let Some(expr) = tag
        .strip_prefix("#if")
        .filter(|rest| rest.starts_with(|c: char| c.is_whitespace() || c == '('))
    {
        return Ok(Token::If(predicate(expr, offset)?));
    }
    if let Some(rest) = tag.strip_prefix("else") {
        let rest = rest.trim();
        if rest.is_empty() {
            return Ok(Token::Else);
        }
        if let Some(expr) = rest.strip_prefix("if ") {
            return Ok(Token::ElseIf(predicate(expr, offset)?));
        }
    }
    if tag == "/if" {
        return Ok(Token::EndIf);
    }
    Ok(Token::Field(field_name(tag, offset)?))
}

fn predicate(expr: &str, offset: usize) -> Result<Predicate, TemplateError> {
    let expr = expr.trim();

    let Some(inner) = expr.strip_prefix('(').and_then(|e| e.strip_suffix(')')) else {
        return Ok(Predicate::Truthy(field_name(expr, offset)?));
    };

    let Some(operands) = inner.trim().strip_prefix("eq ") else {
        return Err(syntax(offset, "only the `eq` helper is supported"));
    };
    let Some((field, literal)) = operands.trim().split_once(char::is_whitespace) else {
        return Err(syntax(offset, "`eq` takes a field and a quoted value"));
    };

    let literal = literal.trim();
    let value = ['"', '\'']
        .iter()
        .find_map(|q| literal.strip_prefix(*q).and_then(|l| l.strip_suffix(*q)))
        .ok_or_else(|| syntax(offset, "`eq` value must be quoted"))?;

    Ok(Predicate::Equals {
        field: field_name(field, offset)?,
        value: value.to_string(),
    })
}

fn field_name(raw: &str, offset: usize) -> Result<String, TemplateError> {
    let name = raw.trim();
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(name.to_string())
    } else {
        Err(syntax(offset, &format!("invalid field name '{name}'")))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Block structure
// ────────────────────────────────────────────────────────────────────────────

struct Parser {
    tokens: Peekable<IntoIter<(usize, Token)>>,
}

impl Parser {
    fn parse_block(&mut self) -> Result<(Vec<Segment>, BlockEnd), TemplateError> {
        let mut segments = Vec::new();

        while let Some((offset, token)) = self.tokens.next() {
            match token {
                Token::Text(text) => segments.push(Segment::Literal(text)),
                Token::Field(name) => segments.push(Segment::Field(name)),
                Token::If(predicate) => segments.push(self.parse_conditional(predicate, offset)?),
                Token::ElseIf(predicate) => return Ok((segments, BlockEnd::ElseIf(predicate))),
                Token::Else => return Ok((segments, BlockEnd::Else)),
                Token::EndIf => return Ok((segments, BlockEnd::EndIf)),
            }
        }

        Ok((segments, BlockEnd::Eof))
    }

    /// Parses the branches following an `{{#if}}` (or an `{{else if}}`, which
    /// shares the enclosing `{{/if}}`).
    fn parse_conditional(
        &mut self,
        predicate: Predicate,
        offset: usize,
    ) -> Result<Segment, TemplateError> {
        let (then, end) = self.parse_block()?;

        let otherwise = match end {
            BlockEnd::EndIf => Vec::new(),
            BlockEnd::Else => match self.parse_block()? {
                (otherwise, BlockEnd::EndIf) => otherwise,
                (_, BlockEnd::Eof) => return Err(syntax(offset, "unclosed {{#if}}")),
                _ => return Err(syntax(offset, "{{else}} after {{else}}")),
            },
            BlockEnd::ElseIf(next) => {
                let offset = self.tokens.peek().map(|(o, _)| *o).unwrap_or(offset);
                vec![self.parse_conditional(next, offset)?]
            }
            BlockEnd::Eof => return Err(syntax(offset, "unclosed {{#if}}")),
        };

        Ok(Segment::Conditional {
            predicate,
            then,
            otherwise,
        })
    }
}
