//! Dotted-path extraction over JSON documents.
//!
//! Paths look like `database.instances[0].sid`: object keys separated by
//! dots, with `[n]` array indexing. This is deliberately a small subset of
//! full JSONPath -- quoted keys, wildcards, and filters are not supported.
//! An empty path selects the document root.

use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum JsonPathError {
    #[error("invalid path syntax near '{0}'")]
    BadSyntax(String),
    #[error("no value at key '{segment}'")]
    Missing { segment: String },
    #[error("index {index} out of bounds (array length {len})")]
    IndexOutOfBounds { index: usize, len: usize },
    #[error("value at '{segment}' is not an array")]
    NotAnArray { segment: String },
    #[error("value at '{segment}' is not an object")]
    NotAnObject { segment: String },
}

/// One step of a parsed path.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Key(String),
    Index(usize),
}

/// Extract the value at `path` from `root`.
pub fn extract<'a>(root: &'a Value, path: &str) -> Result<&'a Value, JsonPathError> {
    let mut current = root;
    for segment in parse_path(path)? {
        current = match &segment {
            Segment::Key(key) => match current {
                Value::Object(map) => map.get(key).ok_or_else(|| JsonPathError::Missing {
                    segment: key.clone(),
                })?,
                _ => {
                    return Err(JsonPathError::NotAnObject {
                        segment: key.clone(),
                    })
                }
            },
            Segment::Index(index) => match current {
                Value::Array(items) => {
                    items.get(*index).ok_or(JsonPathError::IndexOutOfBounds {
                        index: *index,
                        len: items.len(),
                    })?
                }
                _ => {
                    return Err(JsonPathError::NotAnArray {
                        segment: format!("[{index}]"),
                    })
                }
            },
        };
    }
    Ok(current)
}

/// Render a value for shell consumption: strings unquoted, scalars as
/// their literal form, arrays/objects as compact JSON.
pub fn render_scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn parse_path(path: &str) -> Result<Vec<Segment>, JsonPathError> {
    if path.is_empty() {
        return Ok(Vec::new());
    }
    if path.starts_with('.') || path.ends_with('.') || path.contains("..") {
        return Err(JsonPathError::BadSyntax(path.to_string()));
    }

    let mut segments = Vec::new();
    for part in path.split('.') {
        // `key[1][2]` -> key segment plus one index segment per bracket.
        let (key, brackets) = match part.find('[') {
            Some(pos) => (&part[..pos], &part[pos..]),
            None => (part, ""),
        };
        if !key.is_empty() {
            segments.push(Segment::Key(key.to_string()));
        } else if brackets.is_empty() {
            return Err(JsonPathError::BadSyntax(part.to_string()));
        }

        let mut rest = brackets;
        while !rest.is_empty() {
            let Some(stripped) = rest.strip_prefix('[') else {
                return Err(JsonPathError::BadSyntax(part.to_string()));
            };
            let Some(close) = stripped.find(']') else {
                return Err(JsonPathError::BadSyntax(part.to_string()));
            };
            let index: usize = stripped[..close]
                .parse()
                .map_err(|_| JsonPathError::BadSyntax(part.to_string()))?;
            segments.push(Segment::Index(index));
            rest = &stripped[close + 1..];
        }
    }
    Ok(segments)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
