//! The instruction translator boundary
//!
//! A [`Translator`] turns a free-text instruction plus a snapshot of the
//! sheet's non-empty cells into raw response text. The session never trusts
//! that text: [`parse_translation`] pulls the outermost well-formed JSON
//! structure out of whatever surrounds it and decodes the update list.
//!
//! The expected response shape is
//!
//! ```json
//! { "updates": [{ "address": "B2", "value": 120, "formula": null }],
//!   "explanation": "Raised the widget price" }
//! ```
//!
//! A bare array of updates is accepted as well. Within an update, a missing
//! `value`/`formula` key leaves that part of the cell alone while an explicit
//! `null` clears it.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use sheetwright_core::CellValue;

use crate::applier::{normalize_formula, CellUpdate};
use crate::error::{Error, Result};
use crate::view::Grid;

/// Boxed error returned by translator implementations
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// An external capability that answers an instruction with update text
///
/// Implementations own transport and authentication; any failure they
/// return is surfaced as a single [`Error::TranslationFailure`].
pub trait Translator: Send + Sync {
    /// Produce the raw response text for `request`
    fn translate(&self, request: &TranslationRequest) -> std::result::Result<String, BoxError>;
}

impl<F> Translator for F
where
    F: Fn(&TranslationRequest) -> std::result::Result<String, BoxError> + Send + Sync,
{
    fn translate(&self, request: &TranslationRequest) -> std::result::Result<String, BoxError> {
        self(request)
    }
}

/// One non-empty cell as sent to the translator
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CellSnapshot {
    /// A1 address
    pub address: String,
    /// Value as JSON (`null` when the cell only has a formula)
    pub value: Value,
    /// Formula with its leading `=`
    pub formula: Option<String>,
    /// Recorded type name
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

/// What the translator is asked
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TranslationRequest {
    /// The user's free-text instruction
    pub instruction: String,
    /// Every non-empty cell of the active grid, row-major
    pub cells: Vec<CellSnapshot>,
}

impl TranslationRequest {
    /// Snapshot the non-empty cells of `grid` for `instruction`
    pub fn new<S: Into<String>>(instruction: S, grid: &Grid) -> Self {
        let cells = grid
            .cells()
            .filter(|(_, cell)| !cell.is_blank())
            .map(|(addr, cell)| CellSnapshot {
                address: addr.to_string(),
                value: value_to_json(&cell.value),
                formula: cell.formula.as_ref().map(|f| format!("={}", f)),
                kind: cell
                    .kind
                    .or_else(|| cell.value.inferred_kind())
                    .map(|kind| kind.as_str().to_string()),
            })
            .collect();
        Self {
            instruction: instruction.into(),
            cells,
        }
    }

    /// Serialize as JSON
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

fn value_to_json(value: &CellValue) -> Value {
    match value {
        CellValue::Empty => Value::Null,
        CellValue::Number(n) if n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 => {
            Value::from(*n as i64)
        }
        CellValue::Number(n) => serde_json::Number::from_f64(*n)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        CellValue::Text(s) => Value::String(s.clone()),
        CellValue::Bool(b) => Value::Bool(*b),
        CellValue::Date(_) => Value::String(value.to_string()),
    }
}

/// A decoded translator response
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Translation {
    /// Requested updates, in order
    pub updates: Vec<CellUpdate>,
    /// Human-readable explanation
    pub explanation: String,
}

#[derive(Deserialize)]
struct ResponsePayload {
    #[serde(default)]
    updates: Option<Vec<UpdatePayload>>,
    #[serde(default)]
    explanation: Option<String>,
}

#[derive(Deserialize)]
struct UpdatePayload {
    address: String,
    #[serde(default, deserialize_with = "present")]
    value: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    formula: Option<Value>,
}

/// Keeps an explicit `null` as `Some(Value::Null)`; absent keys hit the default
fn present<'de, D>(deserializer: D) -> std::result::Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

impl From<UpdatePayload> for CellUpdate {
    fn from(payload: UpdatePayload) -> Self {
        let value = payload.value.map(|v| match v {
            Value::Null => CellValue::Empty,
            Value::Bool(b) => CellValue::Bool(b),
            Value::Number(n) => n.as_f64().map(CellValue::Number).unwrap_or_default(),
            Value::String(s) => CellValue::Text(s),
            other => CellValue::Text(other.to_string()),
        });
        let formula = payload.formula.map(|f| match f {
            Value::Null => None,
            Value::String(s) => normalize_formula(&s),
            other => normalize_formula(&other.to_string()),
        });
        CellUpdate {
            address: payload.address,
            value,
            formula,
        }
    }
}

/// Top-level bracketed spans of `text`, in order
///
/// Brackets inside JSON string literals are ignored. A span whose brackets
/// do not match ends the scan.
fn bracketed_spans(text: &str) -> Vec<&str> {
    let mut spans = Vec::new();
    let mut stack: Vec<u8> = Vec::new();
    let mut start = 0;
    let mut in_string = false;
    let mut escaped = false;

    for (i, b) in text.bytes().enumerate() {
        if in_string {
            match b {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match b {
            b'"' if !stack.is_empty() => in_string = true,
            b'{' | b'[' => {
                if stack.is_empty() {
                    start = i;
                }
                stack.push(if b == b'{' { b'}' } else { b']' });
            }
            b'}' | b']' if !stack.is_empty() => {
                if stack.pop() != Some(b) {
                    break;
                }
                if stack.is_empty() {
                    spans.push(&text[start..=i]);
                }
            }
            _ => {}
        }
    }

    spans
}

/// Extract the outermost well-formed JSON structure from `text`
///
/// Objects are preferred over arrays; among each, the first span that parses
/// wins.
pub fn extract_payload(text: &str) -> Option<Value> {
    let parsed: Vec<Value> = bracketed_spans(text)
        .into_iter()
        .filter_map(|span| serde_json::from_str::<Value>(span).ok())
        .collect();
    let object = parsed.iter().position(Value::is_object);
    let index = object.or_else(|| parsed.iter().position(Value::is_array))?;
    parsed.into_iter().nth(index)
}

/// Decode translator response text into a [`Translation`]
///
/// Fails with [`Error::TranslationFailure`] when no structure can be found
/// or decoded. An absent or empty update list is not an error here.
pub fn parse_translation(text: &str) -> Result<Translation> {
    let Some(payload) = extract_payload(text) else {
        log::warn!("translator response has no JSON payload ({} bytes)", text.len());
        return Err(Error::translation("response contained no structured payload"));
    };

    let decoded = if payload.is_array() {
        serde_json::from_value::<Vec<UpdatePayload>>(payload).map(|updates| (Some(updates), None))
    } else {
        serde_json::from_value::<ResponsePayload>(payload)
            .map(|response| (response.updates, response.explanation))
    };
    let (updates, explanation) = decoded.map_err(|e| {
        log::warn!("translator payload could not be decoded: {}", e);
        Error::translation(format!("malformed update list: {}", e))
    })?;

    Ok(Translation {
        updates: updates
            .unwrap_or_default()
            .into_iter()
            .map(CellUpdate::from)
            .collect(),
        explanation: explanation.unwrap_or_default(),
    })
}
