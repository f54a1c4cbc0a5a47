//! Heuristic extraction of tabular data from provider responses
//!
//! Providers return the "interesting" array in wildly different places: as
//! the payload itself, buried in an envelope at unknown depth, or embedded
//! as (possibly fenced) JSON text inside a chat answer. This module locates
//! it and produces one canonical array of row objects.
//!
//! The deep search returns the first qualifying array in depth-first,
//! source-order traversal. That tie-break is load-bearing for existing
//! integrations and must not be "improved" into a ranking; `serde_json` is
//! built with `preserve_order` so object properties are visited in
//! declaration order.

use serde_json::{Map, Value};

/// Key used when primitive array elements are promoted to row objects.
const PRIMITIVE_KEY: &str = "value";

/// How the extracted rows came to be.
///
/// The three provenance paths are distinct and deliberately kept apart:
/// a view cloned out of the response tree, a secondary document parsed out
/// of free text, or an array synthesized by this module (primitive wrapping
/// or the degrade row).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowSource {
    /// Rows were found directly in the provider response tree.
    Tree,
    /// Rows came from a JSON document carved out of a text field.
    Embedded,
    /// Rows were newly built rather than found.
    Synthesized,
}

/// Canonical extraction result: an ordered sequence of row values, each a
/// JSON object, plus the provenance of the sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    pub rows: Vec<Value>,
    pub source: RowSource,
}

/// Known provider envelope shapes, naming where the literal text fields
/// live in each provider's response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Envelope {
    /// `candidates[].content.parts[].text` (Gemini-shaped)
    Candidates,
    /// `message.content` (Ollama-shaped)
    Message,
    /// `output[].content[].text` (OpenAI responses-shaped)
    Output,
    /// `choices[].message.content` (OpenAI chat-shaped)
    Choices,
}

impl Envelope {
    /// Collect every literal text field at this envelope's known shape, in
    /// response order.
    pub fn texts<'a>(&self, root: &'a Value) -> Vec<&'a str> {
        match self {
            Envelope::Candidates => root
                .get("candidates")
                .and_then(Value::as_array)
                .map(|candidates| {
                    candidates
                        .iter()
                        .filter_map(|c| c.get("content"))
                        .filter_map(|c| c.get("parts"))
                        .filter_map(Value::as_array)
                        .flatten()
                        .filter_map(|p| p.get("text"))
                        .filter_map(Value::as_str)
                        .collect()
                })
                .unwrap_or_default(),
            Envelope::Message => root
                .get("message")
                .and_then(|m| m.get("content"))
                .and_then(Value::as_str)
                .into_iter()
                .collect(),
            Envelope::Output => root
                .get("output")
                .and_then(Value::as_array)
                .map(|output| {
                    output
                        .iter()
                        .filter_map(|o| o.get("content"))
                        .filter_map(Value::as_array)
                        .flatten()
                        .filter_map(|c| c.get("text"))
                        .filter_map(Value::as_str)
                        .collect()
                })
                .unwrap_or_default(),
            Envelope::Choices => root
                .get("choices")
                .and_then(Value::as_array)
                .map(|choices| {
                    choices
                        .iter()
                        .filter_map(|c| c.get("message"))
                        .filter_map(|m| m.get("content"))
                        .filter_map(Value::as_str)
                        .collect()
                })
                .unwrap_or_default(),
        }
    }
}

/// Parse free text into a JSON document.
///
/// Strips leading/trailing fenced-code markers and tries a direct parse;
/// on failure, carves the first balanced `{...}`/`[...]` substring by
/// nesting depth and parses that. Best-effort: the carve does not account
/// for braces inside string literals.
pub fn text_to_json(text: &str) -> Option<Value> {
    let stripped = strip_code_fences(text);
    if let Ok(value) = serde_json::from_str::<Value>(stripped) {
        return Some(value);
    }
    carve_first_document(stripped).and_then(|candidate| serde_json::from_str(candidate).ok())
}

/// Drop a leading ```` ``` ````/```` ```json ```` line and a trailing
/// ```` ``` ```` line, when present.
fn strip_code_fences(text: &str) -> &str {
    let mut s = text.trim();
    if let Some(rest) = s.strip_prefix("```") {
        // discard the rest of the fence line (may carry a language tag)
        s = match rest.find('\n') {
            Some(idx) => &rest[idx + 1..],
            None => rest,
        };
    }
    if let Some(rest) = s.trim_end().strip_suffix("```") {
        s = rest;
    }
    s.trim()
}

/// Find the first `{` or `[` and track nesting depth character by
/// character until it returns to zero; the covered substring is the
/// candidate document.
fn carve_first_document(text: &str) -> Option<&str> {
    let start = text.find(['{', '['])?;
    let mut depth = 0usize;
    for (idx, ch) in text[start..].char_indices() {
        match ch {
            '{' | '[' => depth += 1,
            '}' | ']' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(&text[start..start + idx + ch.len_utf8()]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Depth-first search for the first non-empty array whose every element is
/// an object.
///
/// Arrays of mixed kinds recurse into each element in order; objects
/// recurse into each property value in declaration order. The first
/// qualifying array wins, ties broken purely by source order.
pub fn deep_find_array_of_objects(value: &Value) -> Option<&Vec<Value>> {
    match value {
        Value::Array(items) => {
            if !items.is_empty() && items.iter().all(Value::is_object) {
                return Some(items);
            }
            items.iter().find_map(deep_find_array_of_objects)
        }
        Value::Object(map) => map.values().find_map(deep_find_array_of_objects),
        _ => None,
    }
}

/// Promote an array whose elements are not uniformly objects into a new
/// array of `{key: cloned element}` rows, in original order. The result is
/// always freshly allocated.
pub fn wrap_primitives(items: &[Value], key: &str) -> Vec<Value> {
    items
        .iter()
        .map(|item| {
            let mut row = Map::new();
            row.insert(key.to_string(), item.clone());
            Value::Object(row)
        })
        .collect()
}

/// Extract the canonical array of row objects from a provider response.
///
/// For each literal text field found at the provider's envelope shape:
/// parse it ([`text_to_json`]), search it ([`deep_find_array_of_objects`]),
/// and failing that promote it ([`wrap_primitives`]); the first text field
/// that yields rows wins. When no text field does, fall back to a deep
/// search over the raw root, and finally degrade to synthesized rows: an
/// object root becomes one row, an array root has each element promoted,
/// and a scalar root is promoted to a single row. Every returned row is a
/// JSON object. The input is never mutated.
pub fn extract(envelope: Envelope, root: &Value) -> Extraction {
    for text in envelope.texts(root) {
        if let Some(extraction) = extract_from_text(text) {
            tracing::debug!(source = ?extraction.source, rows = extraction.rows.len(),
                "rows extracted from envelope text");
            return extraction;
        }
    }

    if let Some(items) = deep_find_array_of_objects(root) {
        return Extraction {
            rows: items.clone(),
            source: RowSource::Tree,
        };
    }

    tracing::debug!("no tabular data located, degrading to synthesized rows");
    let rows = match root {
        Value::Object(_) => vec![root.clone()],
        Value::Array(items) if !items.is_empty() => wrap_primitives(items, PRIMITIVE_KEY),
        other => wrap_primitives(std::slice::from_ref(other), PRIMITIVE_KEY),
    };
    Extraction {
        rows,
        source: RowSource::Synthesized,
    }
}

fn extract_from_text(text: &str) -> Option<Extraction> {
    let document = text_to_json(text)?;

    if let Some(items) = deep_find_array_of_objects(&document) {
        return Some(Extraction {
            rows: items.clone(),
            source: RowSource::Embedded,
        });
    }

    match document {
        Value::Array(items) => Some(Extraction {
            rows: wrap_primitives(&items, PRIMITIVE_KEY),
            source: RowSource::Synthesized,
        }),
        // a carved bare object is a one-row table
        Value::Object(_) => Some(Extraction {
            rows: vec![document],
            source: RowSource::Embedded,
        }),
        _ => None,
    }
}
