//! Strict parsing of free-form judge output into a [`JudicialOpinion`].
//!
//! The judge is asked for a JSON object; what comes back may be wrapped in
//! prose or a fenced code block. The first balanced `{...}` span that is valid
//! JSON is taken, its fields validated, and any defect yields a `failed` opinion.

use serde_json::Value;

use crate::domain::{CriterionSpec, JudicialOpinion};

/// The balanced `{...}` span opening at byte `start`, honouring string literals.
fn balanced_from(raw: &str, start: usize) -> Option<&str> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in raw[start..].char_indices() {
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
                    return Some(&raw[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Find the first balanced `{...}` span in `raw` that parses as a JSON object.
///
/// Every `{` is tried in turn, so braces in surrounding prose do not hide a
/// valid object further on.
pub fn extract_json_object(raw: &str) -> Option<&str> {
    raw.match_indices('{')
        .filter_map(|(start, _)| balanced_from(raw, start))
        .find(|candidate| {
            serde_json::from_str::<Value>(candidate).is_ok_and(|v| v.is_object())
        })
}

fn first_str<'a>(obj: &'a serde_json::Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|k| obj.get(*k))
}

fn parse_score(value: &Value, maximum: u32) -> Result<u32, String> {
    let n = match value {
        Value::Number(n) => n.as_f64().ok_or_else(|| "score is not numeric".to_string())?,
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| format!("score {s:?} is not numeric"))?,
        other => return Err(format!("score has unexpected type: {other}")),
    };
    if !n.is_finite() || n.fract() != 0.0 {
        return Err(format!("score {n} is not an integer"));
    }
    if n < 0.0 || n > f64::from(maximum) {
        return Err(format!("score {n} outside [0, {maximum}]"));
    }
    Ok(n as u32)
}

fn parse_fields(raw: &str, maximum: u32) -> Result<(u32, String, Vec<String>), String> {
    let text = extract_json_object(raw).ok_or_else(|| "no JSON object in judge output".to_string())?;
    let value: Value = serde_json::from_str(text).map_err(|e| format!("invalid JSON: {e}"))?;
    let obj = value
        .as_object()
        .ok_or_else(|| "judge output is not an object".to_string())?;

    let score = parse_score(
        obj.get("score").ok_or_else(|| "missing score".to_string())?,
        maximum,
    )?;

    let justification = match first_str(obj, &["justification", "argument", "reasoning"]) {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(_) => return Err("justification is not a string".to_string()),
        None => return Err("missing justification".to_string()),
    };

    let citations = match first_str(obj, &["citations", "cited_evidence"]) {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => Ok(s.trim().to_string()),
                _ => Err("citation is not a string".to_string()),
            })
            .collect::<Result<Vec<_>, _>>()?,
        Some(_) => return Err("citations is not a list".to_string()),
    };

    Ok((score, justification, citations))
}

/// Parse a judge's raw reply. Never panics; defects become a `failed` opinion.
pub fn parse_opinion(raw: &str, criterion: &CriterionSpec, persona: &str) -> JudicialOpinion {
    match parse_fields(raw, criterion.maximum) {
        Ok((score, justification, citations)) => {
            JudicialOpinion::ok(&criterion.id, persona, score, justification, citations)
        }
        Err(reason) => JudicialOpinion::failed(&criterion.id, persona, reason),
    }
}
