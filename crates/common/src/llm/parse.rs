//! Parsers for free-text LLM output
//!
//! Accepted score formats: a bare number (first token), a fenced JSON
//! block, or an inline JSON object. Anything else yields `None` and the
//! caller applies its own documented fallback.

use regex_lite::Regex;
use std::sync::OnceLock;

const SCORE_KEYS: &[&str] = &["score", "relevance", "difficulty", "value"];

fn fenced_block() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)```(?:json)?\s*(\{.*?\})\s*```").expect("valid fenced-block regex")
    })
}

fn inline_object() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)\{[^{}]*\}").expect("valid object regex"))
}

fn index_marker() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        // the number after the first `:` or `=`, so "(1-based)" is not read as the answer
        Regex::new(r"(?i)selected[\s_-]*index[^\n]{0,20}?[:=][\s*]*(\d+)")
            .expect("valid index regex")
    })
}

fn reason_marker() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?im)^\W*reason\b\W{0,3}\s*(.+)$").expect("valid reason regex"))
}

/// Parse a score in [0, 1] from LLM output
pub fn parse_score(text: &str) -> Option<f64> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Some(caps) = fenced_block().captures(trimmed) {
        if let Some(v) = score_from_json(&caps[1]) {
            return clamp_unit(v);
        }
    }

    if let Some(m) = inline_object().find(trimmed) {
        if let Some(v) = score_from_json(m.as_str()) {
            return clamp_unit(v);
        }
    }

    let first = trimmed
        .split_whitespace()
        .next()?
        .trim_matches(|c: char| !(c.is_ascii_digit() || c == '.' || c == '-'));
    first.parse::<f64>().ok().and_then(clamp_unit)
}

fn score_from_json(raw: &str) -> Option<f64> {
    let value: serde_json::Value = serde_json::from_str(raw).ok()?;
    let obj = value.as_object()?;
    SCORE_KEYS.iter().find_map(|key| match obj.get(*key)? {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

fn clamp_unit(v: f64) -> Option<f64> {
    if v.is_nan() {
        None
    } else {
        Some(v.clamp(0.0, 1.0))
    }
}

/// Index choice returned by a disambiguation prompt
#[derive(Debug, Clone, PartialEq)]
pub struct IndexChoice {
    /// Zero-based position into the offered options
    pub index: usize,
    pub reason: Option<String>,
}

/// Parse a 1-based "selected index" answer against `option_count` options.
///
/// Returns `None` when no marker is found or the index is out of range.
pub fn parse_selected_index(text: &str, option_count: usize) -> Option<IndexChoice> {
    let raw = index_marker()
        .captures(text)
        .and_then(|caps| caps[1].parse::<usize>().ok())
        .or_else(|| {
            let m = inline_object().find(text)?;
            let value: serde_json::Value = serde_json::from_str(m.as_str()).ok()?;
            value.get("selected_index")?.as_u64().map(|v| v as usize)
        })?;

    if raw == 0 || raw > option_count {
        return None;
    }

    let reason = reason_marker()
        .captures(text)
        .map(|caps| caps[1].trim().to_string())
        .filter(|r| !r.is_empty());

    Some(IndexChoice {
        index: raw - 1,
        reason,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_float() {
        assert_eq!(parse_score("0.85"), Some(0.85));
        assert_eq!(parse_score("  0.4\n"), Some(0.4));
        assert_eq!(parse_score("0.7 because it matches"), Some(0.7));
    }

    #[test]
    fn test_out_of_range_is_clamped() {
        assert_eq!(parse_score("1.7"), Some(1.0));
        assert_eq!(parse_score("-3"), Some(0.0));
    }

    #[test]
    fn test_json_formats() {
        assert_eq!(parse_score("```json\n{\"score\": 0.3}\n```"), Some(0.3));
        assert_eq!(parse_score("Result: {\"relevance\": \"0.9\"}"), Some(0.9));
    }

    #[test]
    fn test_unparseable_yields_none() {
        assert_eq!(parse_score(""), None);
        assert_eq!(parse_score("highly relevant"), None);
        assert_eq!(parse_score("NaN"), None);
    }

    #[test]
    fn test_selected_index_marker() {
        let text = "Selected index: 2\nReason: It is the foundational transformer paper.";
        let choice = parse_selected_index(text, 3).unwrap();
        assert_eq!(choice.index, 1);
        assert_eq!(
            choice.reason.as_deref(),
            Some("It is the foundational transformer paper.")
        );
    }

    #[test]
    fn test_selected_index_json_and_range() {
        let choice = parse_selected_index("{\"selected_index\": 3}", 3).unwrap();
        assert_eq!(choice.index, 2);
        assert!(parse_selected_index("SELECTED_INDEX = 4", 3).is_none());
        assert!(parse_selected_index("selected index: 0", 3).is_none());
        assert!(parse_selected_index("I pick the second", 3).is_none());
    }

    #[test]
    fn test_selected_index_reads_the_answer_not_the_label() {
        let choice = parse_selected_index("Selected index (1-based): 2", 3).unwrap();
        assert_eq!(choice.index, 1);

        let choice = parse_selected_index("**Selected index:** 3", 3).unwrap();
        assert_eq!(choice.index, 2);
    }

    #[test]
    fn test_reason_label_must_be_whole_word() {
        let choice =
            parse_selected_index("Selected index: 2\nReasoning: shared baseline.", 3).unwrap();
        assert_eq!(choice.index, 1);
        assert_eq!(choice.reason, None);

        let choice = parse_selected_index("Selected index: 1\n- Reason - shared baseline.", 3)
            .unwrap();
        assert_eq!(choice.reason.as_deref(), Some("shared baseline."));
    }
}
