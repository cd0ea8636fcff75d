//! Pull the JSON payload out of free-form model text.

use crate::error::PipelineError;

/// Return the first balanced JSON object in `text`, or failing that the first array.
///
/// Markdown code fences are stripped first. Braces inside string literals are not counted.
/// Objects win over arrays so bracketed prose ahead of the payload is skipped.
pub fn extract_json(text: &str) -> Result<String, PipelineError> {
    let cleaned = strip_fences(text.trim());

    ['{', '[']
        .into_iter()
        .find_map(|opener| first_balanced(&cleaned, opener))
        .ok_or_else(|| {
            PipelineError::Generation(format!(
                "No JSON value found in model response ({} chars)",
                text.len()
            ))
        })
}

/// First parseable balanced value in `text` that starts with `opener`.
fn first_balanced(text: &str, opener: char) -> Option<String> {
    let mut search_from = 0;
    while let Some(offset) = text[search_from..].find(opener) {
        let start = search_from + offset;
        if let Some(end) = balanced_end(&text[start..]) {
            let candidate = &text[start..start + end];
            if serde_json::from_str::<serde_json::Value>(candidate).is_ok() {
                return Some(candidate.to_string());
            }
        }
        search_from = start + opener.len_utf8();
    }
    None
}

fn strip_fences(text: &str) -> String {
    if !text.contains("```") {
        return text.to_string();
    }
    text.lines()
        .filter(|line| !line.trim_start().starts_with("```"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Byte length of the balanced value starting at the first byte of `s`, if it closes.
fn balanced_end(s: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in s.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' | '[' => depth += 1,
            '}' | ']' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i + c.len_utf8());
                }
            }
            _ => {}
        }
    }
    None
}
