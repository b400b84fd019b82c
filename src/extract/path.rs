//! JSON path compiler and evaluator over `serde_json::Value`.
//!
//! Supported syntax:
//! - `$` (or `@`) root; a path without a root marker is read as `$.` + path
//! - `.key` and `['key']` / `["key"]` member access
//! - `[n]` array index, negative counts from the end
//! - `[*]` / `.*` wildcard over array elements or object values
//! - `..key` / `..*` recursive descent
//!
//! A path without wildcard or descent steps is *definite* and resolves to exactly one
//! value or fails. Any other path collects every match into an array and never fails
//! on missing members.

use serde_json::Value;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("path '{path}': {reason}")]
pub struct PathError {
    pub path: String,
    pub reason: String,
}

impl PathError {
    fn new(path: &str, reason: impl Into<String>) -> Self {
        Self {
            path: path.to_string(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Step {
    Member(String),
    Index(i64),
    Wildcard,
    /// `..name` when `Some`, `..*` when `None`.
    Descend(Option<String>),
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Member(m) => write!(f, "['{m}']"),
            Step::Index(i) => write!(f, "[{i}]"),
            Step::Wildcard => f.write_str("[*]"),
            Step::Descend(Some(m)) => write!(f, "..['{m}']"),
            Step::Descend(None) => f.write_str("..*"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct JsonPath {
    raw: String,
    steps: Vec<Step>,
}

impl JsonPath {
    pub fn compile(path: &str) -> Result<Self, PathError> {
        let raw = path.trim();
        if raw.is_empty() {
            return Err(PathError::new(path, "empty path expression"));
        }

        let chars: Vec<char> = raw.chars().collect();
        let mut steps = Vec::new();
        let mut pos = 0;

        match chars[0] {
            '$' | '@' => pos = 1,
            '[' | '.' => {}
            _ => {
                // bare `data.id` reads as `$.data.id`
                let (name, next) = read_name(&chars, 0);
                steps.push(Step::Member(name));
                pos = next;
            }
        }

        while pos < chars.len() {
            match chars[pos] {
                '.' if chars.get(pos + 1) == Some(&'.') => {
                    pos += 2;
                    if chars.get(pos) == Some(&'*') {
                        steps.push(Step::Descend(None));
                        pos += 1;
                    } else {
                        let (name, next) = read_name(&chars, pos);
                        if name.is_empty() {
                            return Err(PathError::new(raw, format!("empty member after '..' at {pos}")));
                        }
                        steps.push(Step::Descend(Some(name)));
                        pos = next;
                    }
                }
                '.' => {
                    pos += 1;
                    if chars.get(pos) == Some(&'*') {
                        steps.push(Step::Wildcard);
                        pos += 1;
                    } else {
                        let (name, next) = read_name(&chars, pos);
                        if name.is_empty() {
                            return Err(PathError::new(raw, format!("empty member name at {pos}")));
                        }
                        steps.push(Step::Member(name));
                        pos = next;
                    }
                }
                '[' => {
                    let (step, next) = read_bracket(raw, &chars, pos + 1)?;
                    steps.push(step);
                    pos = next;
                }
                c if c.is_whitespace() => pos += 1,
                c => {
                    return Err(PathError::new(
                        raw,
                        format!("unexpected character '{c}' at {pos}"),
                    ))
                }
            }
        }

        Ok(Self {
            raw: raw.to_string(),
            steps,
        })
    }

    pub fn is_definite(&self) -> bool {
        self.steps
            .iter()
            .all(|s| matches!(s, Step::Member(_) | Step::Index(_)))
    }

    /// Resolves the path against `doc`. The result may itself be queried again.
    pub fn evaluate(&self, doc: &Value) -> Result<Value, PathError> {
        if self.is_definite() {
            self.evaluate_definite(doc).cloned()
        } else {
            Ok(Value::Array(
                self.evaluate_all(doc).into_iter().cloned().collect(),
            ))
        }
    }

    fn evaluate_definite<'a>(&self, doc: &'a Value) -> Result<&'a Value, PathError> {
        let mut current = doc;
        let mut walked = String::from("$");
        for step in &self.steps {
            current = match step {
                Step::Member(name) => match current {
                    Value::Object(map) => map.get(name).ok_or_else(|| {
                        PathError::new(&self.raw, format!("missing member '{name}' at {walked}"))
                    })?,
                    other => {
                        return Err(PathError::new(
                            &self.raw,
                            format!(
                                "expected object at {walked} to read '{name}', found {}",
                                kind(other)
                            ),
                        ))
                    }
                },
                Step::Index(idx) => match current {
                    Value::Array(items) => resolve_index(items, *idx).ok_or_else(|| {
                        PathError::new(
                            &self.raw,
                            format!(
                                "index {idx} out of range at {walked} (length {})",
                                items.len()
                            ),
                        )
                    })?,
                    other => {
                        return Err(PathError::new(
                            &self.raw,
                            format!("expected array at {walked}, found {}", kind(other)),
                        ))
                    }
                },
                Step::Wildcard | Step::Descend(_) => unreachable!("definite paths only"),
            };
            walked.push_str(&step.to_string());
        }
        Ok(current)
    }

    fn evaluate_all<'a>(&self, doc: &'a Value) -> Vec<&'a Value> {
        let mut current = vec![doc];
        for step in &self.steps {
            let mut next = Vec::new();
            for node in current {
                match step {
                    Step::Member(name) => {
                        if let Some(v) = node.as_object().and_then(|m| m.get(name)) {
                            next.push(v);
                        }
                    }
                    Step::Index(idx) => {
                        if let Some(v) = node.as_array().and_then(|a| resolve_index(a, *idx)) {
                            next.push(v);
                        }
                    }
                    Step::Wildcard => push_children(node, &mut next),
                    Step::Descend(name) => descend(node, name.as_deref(), &mut next),
                }
            }
            current = next;
        }
        current
    }
}

/// Compiles `path` and resolves it against `doc`.
pub fn extract(doc: &Value, path: &str) -> Result<Value, PathError> {
    JsonPath::compile(path)?.evaluate(doc)
}

fn read_name(chars: &[char], start: usize) -> (String, usize) {
    let mut pos = start;
    while pos < chars.len() && chars[pos] != '.' && chars[pos] != '[' && !chars[pos].is_whitespace()
    {
        pos += 1;
    }
    (chars[start..pos].iter().collect(), pos)
}

fn read_bracket(raw: &str, chars: &[char], mut pos: usize) -> Result<(Step, usize), PathError> {
    while pos < chars.len() && chars[pos].is_whitespace() {
        pos += 1;
    }
    let step = match chars.get(pos) {
        None => return Err(PathError::new(raw, "unclosed bracket")),
        Some('*') => {
            pos += 1;
            Step::Wildcard
        }
        Some(&quote) if quote == '\'' || quote == '"' => {
            pos += 1;
            let start = pos;
            while pos < chars.len() && chars[pos] != quote {
                pos += 1;
            }
            if pos >= chars.len() {
                return Err(PathError::new(raw, "unclosed quoted member"));
            }
            let name: String = chars[start..pos].iter().collect();
            pos += 1;
            Step::Member(name)
        }
        Some(_) => {
            let start = pos;
            if chars[pos] == '-' {
                pos += 1;
            }
            while pos < chars.len() && chars[pos].is_ascii_digit() {
                pos += 1;
            }
            let digits: String = chars[start..pos].iter().collect();
            let idx = digits.parse::<i64>().map_err(|_| {
                PathError::new(raw, format!("expected index, '*' or quoted member at {start}"))
            })?;
            Step::Index(idx)
        }
    };
    while pos < chars.len() && chars[pos].is_whitespace() {
        pos += 1;
    }
    if chars.get(pos) != Some(&']') {
        return Err(PathError::new(raw, format!("expected ']' at {pos}")));
    }
    Ok((step, pos + 1))
}

fn resolve_index(items: &[Value], idx: i64) -> Option<&Value> {
    let len = i64::try_from(items.len()).ok()?;
    let i = if idx < 0 { len + idx } else { idx };
    usize::try_from(i).ok().and_then(|i| items.get(i))
}

fn push_children<'a>(node: &'a Value, out: &mut Vec<&'a Value>) {
    match node {
        Value::Array(items) => out.extend(items.iter()),
        Value::Object(map) => out.extend(map.values()),
        _ => {}
    }
}

fn descend<'a>(node: &'a Value, name: Option<&str>, out: &mut Vec<&'a Value>) {
    match name {
        Some(n) => {
            if let Some(v) = node.as_object().and_then(|m| m.get(n)) {
                out.push(v);
            }
        }
        None => push_children(node, out),
    }
    let children: Vec<&Value> = match node {
        Value::Array(items) => items.iter().collect(),
        Value::Object(map) => map.values().collect(),
        _ => return,
    };
    for child in children {
        descend(child, name, out);
    }
}

fn kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
