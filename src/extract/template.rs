// src/extract/template.rs
use std::collections::HashMap;

/// Per-call bindings for `{name}` placeholders in URLs and statements.
pub type PathVariables = HashMap<String, String>;

/// Replaces every `{key}` in `template` with `vars[key]`.
///
/// Single pass: substituted values are never re-scanned, and placeholders without a
/// binding are left as written.
pub fn substitute(template: &str, vars: &PathVariables) -> String {
    if vars.is_empty() {
        return template.to_string();
    }

    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        match after.find(['{', '}']) {
            Some(close) if after.as_bytes()[close] == b'}' => {
                let key = &after[..close];
                match vars.get(key) {
                    Some(v) => out.push_str(v),
                    None => {
                        out.push('{');
                        out.push_str(key);
                        out.push('}');
                    }
                }
                rest = &after[close + 1..];
            }
            _ => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}
