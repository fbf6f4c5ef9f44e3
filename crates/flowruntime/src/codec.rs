//! Text form of an activity as it travels through the execution backend.
//!
//! The backend hands the configuration back as interpolated text, so it may
//! contain raw line breaks and escapes that strict JSON rejects.

use serde::{Deserialize, Serialize};

/// Activity envelope stored on each activity node of the graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredActivity {
    pub id: String,
    pub kind: String,
    #[serde(default)]
    pub config: serde_json::Value,
}

impl StoredActivity {
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn decode(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(&normalize_activity_text(raw))
    }
}

/// Makes interpolated activity text parseable as JSON.
///
/// Inside string literals, runs of `\r`/`\n` collapse into one escaped `\n`
/// and a backslash before a character that is not a JSON escape is dropped,
/// so `\$` and `\#` read as `$` and `#`. Text outside literals is untouched.
pub fn normalize_activity_text(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();
    let mut in_string = false;

    while let Some(c) = chars.next() {
        match c {
            '"' => {
                in_string = !in_string;
                out.push(c);
            }
            '\\' if in_string => match chars.next() {
                Some(next @ ('"' | '\\' | '/' | 'b' | 'f' | 'n' | 'r' | 't' | 'u')) => {
                    out.push('\\');
                    out.push(next);
                }
                Some('\r' | '\n') => {
                    skip_line_breaks(&mut chars);
                    out.push_str("\\n");
                }
                Some(other) => out.push(other),
                None => out.push('\\'),
            },
            '\r' | '\n' if in_string => {
                skip_line_breaks(&mut chars);
                out.push_str("\\n");
            }
            _ => out.push(c),
        }
    }
    out
}

fn skip_line_breaks(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) {
    while matches!(chars.peek(), Some('\r' | '\n')) {
        chars.next();
    }
}
