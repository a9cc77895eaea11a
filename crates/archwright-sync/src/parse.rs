use std::collections::HashSet;

use archwright_core::PlanStep;
use serde_json::Value;
use tracing::warn;

/// A model reply split into what the user sees and the structured block.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedReply {
    pub display_text: String,
    pub payload: Option<Value>,
    /// A `json` block was present but did not parse.
    pub malformed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FencedBlock<'a> {
    /// Byte range of the whole block, fences included.
    start: usize,
    end: usize,
    tag: &'a str,
    body: &'a str,
}

/// Find every terminated ``` fenced block in order. An unterminated fence ends the scan.
fn fenced_blocks(raw: &str) -> Vec<FencedBlock<'_>> {
    let mut blocks = Vec::new();
    let mut cursor = 0;

    while let Some(rel) = raw[cursor..].find("```") {
        let start = cursor + rel;
        let after_fence = start + 3;
        let tag_len = raw[after_fence..]
            .find(|c: char| !c.is_ascii_alphanumeric() && c != '_' && c != '-')
            .unwrap_or(raw.len() - after_fence);
        let tag = &raw[after_fence..after_fence + tag_len];
        let body_start = after_fence + tag_len;

        let Some(close_rel) = raw[body_start..].find("```") else {
            break;
        };
        let close = body_start + close_rel;
        blocks.push(FencedBlock {
            start,
            end: close + 3,
            tag,
            body: &raw[body_start..close],
        });
        cursor = close + 3;
    }

    blocks
}

/// Split a raw reply. The payload is the LAST fenced block tagged `json`;
/// earlier fenced examples stay in the display text.
pub fn parse_reply(raw: &str) -> ParsedReply {
    let Some(block) = fenced_blocks(raw)
        .into_iter()
        .filter(|b| b.tag.eq_ignore_ascii_case("json"))
        .last()
    else {
        return ParsedReply {
            display_text: raw.trim().to_string(),
            payload: None,
            malformed: false,
        };
    };

    match serde_json::from_str::<Value>(block.body.trim()) {
        Ok(payload) => {
            let mut display = String::with_capacity(raw.len());
            display.push_str(&raw[..block.start]);
            display.push_str(&raw[block.end..]);
            ParsedReply {
                display_text: display.trim().to_string(),
                payload: Some(payload),
                malformed: false,
            }
        }
        Err(e) => {
            warn!(error = %e, "structured block is not valid JSON, showing raw reply");
            ParsedReply {
                display_text: raw.trim().to_string(),
                payload: None,
                malformed: true,
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlanParseError {
    #[error("reply contains no JSON array of plan steps")]
    NoArray,
    #[error("plan has no steps")]
    Empty,
    #[error("plan step id '{0}' appears more than once")]
    DuplicateStepId(String),
}

/// Parse a planner reply into ordered plan steps.
/// Tolerates prose around the array and salvages well-formed items from a
/// broken array.
pub fn parse_plan(raw: &str) -> Result<Vec<PlanStep>, PlanParseError> {
    let fenced = fenced_blocks(raw)
        .into_iter()
        .filter(|b| b.tag.eq_ignore_ascii_case("json"))
        .last()
        .map(|b| b.body.to_string());
    let json_str = fenced
        .as_deref()
        .and_then(extract_json_array)
        .or_else(|| extract_json_array(raw))
        .ok_or(PlanParseError::NoArray)?;

    let steps: Vec<PlanStep> = match serde_json::from_str(&json_str) {
        Ok(s) => s,
        Err(_) => parse_object_by_object(&json_str),
    };

    let steps: Vec<PlanStep> = steps
        .into_iter()
        .map(|s| PlanStep {
            id: s.id.trim().to_string(),
            title: s.title.trim().to_string(),
        })
        .filter(|s| !s.id.is_empty() && !s.title.is_empty())
        .collect();
    if steps.is_empty() {
        return Err(PlanParseError::Empty);
    }

    let mut seen = HashSet::new();
    for step in &steps {
        if !seen.insert(step.id.as_str()) {
            return Err(PlanParseError::DuplicateStepId(step.id.clone()));
        }
    }
    Ok(steps)
}

/// Extract the JSON array substring from raw LLM output.
fn extract_json_array(raw: &str) -> Option<String> {
    let start = raw.find('[')?;
    let end = raw.rfind(']')?;
    if end <= start {
        return None;
    }
    Some(raw[start..=end].to_string())
}

/// Try to parse individual objects from a malformed JSON array.
fn parse_object_by_object(json_str: &str) -> Vec<PlanStep> {
    let mut steps = Vec::new();
    let mut depth = 0usize;
    let mut start = None;
    let mut in_string = false;
    let mut escaped = false;

    for (i, ch) in json_str.char_indices() {
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
            '{' => {
                if depth == 0 {
                    start = Some(i);
                }
                depth += 1;
            }
            '}' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    if let Some(s) = start.take() {
                        if let Ok(step) = serde_json::from_str::<PlanStep>(&json_str[s..=i]) {
                            steps.push(step);
                        }
                    }
                }
            }
            _ => {}
        }
    }

    steps
}
