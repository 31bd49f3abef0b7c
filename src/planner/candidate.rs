use serde_json::Value;

use crate::kernel::event::{Candidate, GenerationStage, IntentAxis, MAX_CANDIDATES};

/// Intent assigned by position when a backend omits or garbles it.
pub const DEFAULT_INTENT_CYCLE: [IntentAxis; 4] = [
    IntentAxis::EmotionalResponse,
    IntentAxis::Question,
    IntentAxis::SelfReference,
    IntentAxis::ActionRequest,
];

const DEFAULT_JSON_CONFIDENCE: f32 = 0.7;
const LINE_CONFIDENCE: f32 = 0.5;
const MAX_LINE_CHARS: usize = 100;

fn default_intent(index: usize) -> IntentAxis {
    DEFAULT_INTENT_CYCLE[index % DEFAULT_INTENT_CYCLE.len()]
}

/// Turns raw model output into at most `min(max_candidates, 4)` candidates.
///
/// Tries a JSON array of `{text, intent, confidence}` objects first and falls
/// back to one candidate per line whenever the array gives nothing usable.
/// Never fails: garbage yields an empty list.
pub fn parse_candidates(
    raw: &str,
    stage: GenerationStage,
    latency_ms: u64,
    max_candidates: usize,
) -> Vec<Candidate> {
    let limit = max_candidates.min(MAX_CANDIDATES);
    if limit == 0 || raw.trim().is_empty() {
        return Vec::new();
    }

    let mut candidates = find_json_array(raw)
        .map(|items| from_json(&items, stage, latency_ms))
        .unwrap_or_default();
    if candidates.is_empty() {
        candidates = from_lines(raw, stage, latency_ms);
    }
    candidates.truncate(limit);
    candidates
}

/// First `[` paired with the earliest `]` that closes a valid JSON array.
fn find_json_array(raw: &str) -> Option<Vec<Value>> {
    let start = raw.find('[')?;
    let tail = &raw[start..];
    tail.match_indices(']').find_map(|(end, _)| {
        match serde_json::from_str::<Value>(&tail[..=end]) {
            Ok(Value::Array(items)) => Some(items),
            _ => None,
        }
    })
}

fn from_json(items: &[Value], stage: GenerationStage, latency_ms: u64) -> Vec<Candidate> {
    items
        .iter()
        .enumerate()
        .filter_map(|(i, item)| {
            let text = item.get("text")?.as_str()?.trim();
            if text.is_empty() {
                return None;
            }
            let intent_axis = item
                .get("intent")
                .and_then(Value::as_str)
                .and_then(IntentAxis::parse)
                .unwrap_or_else(|| default_intent(i));
            let confidence = item
                .get("confidence")
                .and_then(Value::as_f64)
                .map(|c| c as f32)
                .unwrap_or(DEFAULT_JSON_CONFIDENCE)
                .clamp(0.0, 1.0);

            Some(Candidate {
                text: text.to_string(),
                intent_axis,
                confidence,
                generation_stage: stage,
                latency_ms,
            })
        })
        .collect()
}

fn from_lines(raw: &str, stage: GenerationStage, latency_ms: u64) -> Vec<Candidate> {
    raw.lines()
        .map(strip_list_marker)
        .filter(|line| !line.is_empty() && line.chars().count() <= MAX_LINE_CHARS)
        .filter(|line| !is_json_punctuation(line))
        .enumerate()
        .map(|(i, line)| Candidate {
            text: line.to_string(),
            intent_axis: default_intent(i),
            confidence: LINE_CONFIDENCE,
            generation_stage: stage,
            latency_ms,
        })
        .collect()
}

/// Leftover `[]`, `{`, `],` lines from a broken JSON reply.
fn is_json_punctuation(line: &str) -> bool {
    line.chars().all(|c| matches!(c, '[' | ']' | '{' | '}' | ',' | ' '))
}

/// Drops `1.`/`1)` numbering, bullets and surrounding quotes.
fn strip_list_marker(line: &str) -> &str {
    let mut s = line.trim();

    let digits = s.len() - s.trim_start_matches(|c: char| c.is_ascii_digit()).len();
    if digits > 0 {
        let rest = &s[digits..];
        if let Some(r) = rest.strip_prefix('.').or_else(|| rest.strip_prefix(')')) {
            s = r.trim_start();
        }
    }
    if let Some(r) = s.strip_prefix('-').or_else(|| s.strip_prefix('*')) {
        s = r.trim_start();
    }

    s.trim_matches(|c: char| matches!(c, '"' | '\'' | '「' | '」' | '“' | '”')).trim()
}
