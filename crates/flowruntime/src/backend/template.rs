use flowcore::{Value, Variable};
use std::collections::HashMap;

/// Replaces `${name}` and `${name.path.to.field}` placeholders in activity
/// text with instance variables.
///
/// The exact variable name wins; otherwise the longest variable name that
/// prefixes the path is decoded as JSON and walked for the remaining
/// segments. Inserted text is escaped for a JSON string literal except for
/// line breaks. Unresolved placeholders are left as written.
pub fn interpolate(text: &str, variables: &HashMap<String, Variable>) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            out.push_str(&rest[start..]);
            return out;
        };
        let path = after[..end].trim();
        match lookup(path, variables) {
            Some(value) => out.push_str(&escape(&value)),
            None => out.push_str(&rest[start..start + 2 + end + 1]),
        }
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    out
}

fn lookup(path: &str, variables: &HashMap<String, Variable>) -> Option<String> {
    if path.is_empty() {
        return None;
    }
    if let Some(variable) = variables.get(path) {
        return Some(variable.to_text());
    }

    let mut split = path.len();
    while let Some(dot) = path[..split].rfind('.') {
        split = dot;
        let Some(variable) = variables.get(&path[..split]) else {
            continue;
        };
        let mut node = variable.to_json().ok()?;
        for segment in path[split + 1..].split('.') {
            node = match node {
                serde_json::Value::Object(mut map) => map.remove(segment)?,
                serde_json::Value::Array(mut items) => {
                    let index: usize = segment.parse().ok()?;
                    if index >= items.len() {
                        return None;
                    }
                    items.swap_remove(index)
                }
                _ => return None,
            };
        }
        return Some(Value::from(node).to_text());
    }
    None
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\t' => out.push_str("\\t"),
            // line breaks are escaped later by the activity codec
            '\n' | '\r' => out.push(c),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
            _ => out.push(c),
        }
    }
    out
}
