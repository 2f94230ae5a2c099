use serde_json::Value;

use crate::literal::{parse_literal, LiteralError};
use crate::models::{AnswerRecord, AnswerSet};

// ── Parse failures (never surfaced to callers) ───────────────────────────────

#[derive(Debug, thiserror::Error)]
enum ParseFailure {
    #[error("not a literal: {0}")]
    Literal(#[from] LiteralError),
    #[error("expected a list of answers, got {0}")]
    NotAList(&'static str),
    #[error("answer {0} is not a mapping")]
    NotAMapping(usize),
    #[error("answer {index} has no '{key}' key")]
    MissingKey { index: usize, key: &'static str },
}

// ── Public API ───────────────────────────────────────────────────────────────

/// Turn the model's raw completion into answer records.
///
/// Anything unparseable degrades to an empty set; the reason is only logged.
pub fn parse_answers(raw: &str) -> AnswerSet {
    match try_parse(raw) {
        Ok(answers) => answers,
        Err(reason) => {
            tracing::warn!(%reason, raw, "could not parse model completion, returning no answers");
            Vec::new()
        }
    }
}

fn try_parse(raw: &str) -> Result<AnswerSet, ParseFailure> {
    let items = match parse_literal(strip_code_fence(raw))? {
        Value::Array(items) => items,
        other => return Err(ParseFailure::NotAList(type_name(&other))),
    };

    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            let Value::Object(mut fields) = item else {
                return Err(ParseFailure::NotAMapping(index));
            };
            let expr = fields
                .remove("expr")
                .ok_or(ParseFailure::MissingKey { index, key: "expr" })?;
            let result = fields
                .remove("result")
                .ok_or(ParseFailure::MissingKey { index, key: "result" })?;

            Ok(AnswerRecord {
                expr: match expr {
                    Value::String(s) => s,
                    other => other.to_string(),
                },
                result,
                // Declaring the key at all marks an assignment, whatever its value.
                assign: fields.contains_key("assign"),
            })
        })
        .collect()
}

/// Drop one enclosing markdown fence (with an optional info string).
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(body) = trimmed
        .strip_prefix("```")
        .and_then(|after| after.strip_suffix("```"))
    else {
        return trimmed;
    };
    match body.split_once('\n') {
        Some((info, rest)) if info.trim().chars().all(|c| c.is_ascii_alphanumeric()) => {
            rest.trim()
        }
        _ => body.trim(),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "None",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "a mapping",
    }
}
