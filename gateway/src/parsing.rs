//! Recovery of a structured JSON value from an LLM response that may be
//! wrapped in prose.
//!
//! A direct `serde_json::from_str` is tried first. When the model wraps its
//! answer in commentary, we fall back to a balanced-delimiter scanner that
//! locates the first fully-balanced `{...}` or `[...]` span and decodes
//! that — rather than a greedy regex, which gets confused by nested or
//! multiple top-level spans (a non-greedy `.*?` stops at the first closing
//! delimiter, which may close an inner object, not the outer one).

use serde_json::Value;

/// Attempt to recover a structured JSON value from `content`.
///
/// Tries a direct decode first; on failure, scans for the first balanced
/// `{...}` or `[...]` span (honoring string literals and escapes so a
/// delimiter inside a quoted string isn't mistaken for structure) and
/// decodes that span instead.
pub fn extract_json(content: &str) -> Option<Value> {
    if let Ok(value) = serde_json::from_str(content) {
        return Some(value);
    }
    let span = first_balanced_span(content)?;
    serde_json::from_str(span).ok()
}

/// Find the first fully-balanced `{...}` or `[...]` substring in `text`.
fn first_balanced_span(text: &str) -> Option<&str> {
    let bytes = text.as_bytes();
    let mut start = None;
    let mut depth: i32 = 0;
    let mut in_string = false;
    let mut escaped = false;
    let mut stack: Vec<u8> = Vec::new();

    for (i, &b) in bytes.iter().enumerate() {
        if start.is_none() {
            if b == b'{' || b == b'[' {
                start = Some(i);
                depth = 1;
                stack.push(b);
                in_string = false;
                escaped = false;
            }
            continue;
        }

        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }

        match b {
            b'"' => in_string = true,
            b'{' | b'[' => {
                stack.push(b);
                depth += 1;
            }
            b'}' | b']' => {
                let opener = if b == b'}' { b'{' } else { b'[' };
                if stack.pop() != Some(opener) {
                    // Mismatched delimiter: this span is not valid JSON structure.
                    // Keep scanning for a later, properly balanced span.
                    start = None;
                    depth = 0;
                    stack.clear();
                    continue;
                }
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start.unwrap()..=i]);
                }
            }
            _ => {}
        }
    }
    None
}
