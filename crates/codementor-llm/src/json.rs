//! Extraction of JSON payloads from model output.
//!
//! Models asked for "raw JSON only" still wrap answers in Markdown fences or
//! add a sentence of preamble. These helpers find the first complete JSON
//! object in the text; anything that does not contain one is reported as
//! [`LlmError::Malformed`].

use serde::de::DeserializeOwned;

use crate::{LlmError, Result};

/// Removes a Markdown code fence wrapping the whole reply, if present.
///
/// Handles both ```` ```json ```` and bare ```` ``` ```` fences. Only a fence
/// that opens the reply and closes it is stripped; fences inside JSON string
/// values are left alone. Text without a wrapping fence is returned trimmed.
pub fn strip_code_fences(text: &str) -> &str {
    use regex::Regex;

    let trimmed = text.trim();

    // Anchored at both ends; the body is greedy so nested fences stay inside it.
    let Ok(re) = Regex::new(r"(?s)\A```[A-Za-z0-9_-]*[ \t]*\r?\n?(.*)```\z") else {
        return trimmed;
    };

    re.captures(trimmed)
        .and_then(|cap| cap.get(1))
        .map_or(trimmed, |m| m.as_str().trim())
}

/// Returns the first balanced `{ ... }` object found in `text`.
///
/// The body of a wrapping fence is scanned first; if it holds no complete
/// object the whole text is scanned. Braces
/// inside JSON string literals are ignored, so code samples embedded in
/// string values do not confuse the scan.
pub fn extract_json_object(text: &str) -> Result<&str> {
    scan_object(strip_code_fences(text)).or_else(|_| scan_object(text))
}

fn scan_object(body: &str) -> Result<&str> {
    let start = body
        .find('{')
        .ok_or_else(|| LlmError::malformed("response contains no JSON object"))?;

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in body[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    let end = start + offset + ch.len_utf8();
                    return Ok(&body[start..end]);
                }
            }
            _ => {}
        }
    }

    Err(LlmError::malformed("response JSON object is not terminated"))
}

/// Extracts the first JSON object from `text` and deserializes it into `T`.
pub fn parse_json_object<T: DeserializeOwned>(text: &str) -> Result<T> {
    let raw = extract_json_object(text)?;
    serde_json::from_str(raw).map_err(|e| LlmError::malformed(e.to_string()))
}
