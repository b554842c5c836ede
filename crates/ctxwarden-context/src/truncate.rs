//! Structure-aware truncation of tool outputs.

use crate::components::value_text;
use ctxwarden_core::{ContentType, HeuristicEstimator, TokenEstimator};
use serde_json::{json, Value};

/// Object keys listed in a structural summary.
const SUMMARY_KEY_LIMIT: usize = 20;

/// Shrink `value` to roughly `max_tokens` using the heuristic estimator.
pub fn truncate_tool_output(value: &Value, max_tokens: usize) -> Value {
    truncate_tool_output_with(&HeuristicEstimator::new(), value, max_tokens)
}

/// Shrink `value` to at most `max_tokens` as counted by `estimator`.
///
/// Values within budget come back unchanged, as do numbers, booleans and
/// null. Strings are cut on a character boundary and marked, with the
/// marker charged against the budget; arrays and objects are replaced by a
/// summary of their shape. The result never costs more than the input.
pub fn truncate_tool_output_with(estimator: &dyn TokenEstimator, value: &Value, max_tokens: usize) -> Value {
    let text = value_text(value);
    let tokens = estimator.estimate(&text, ContentType::Code);
    if tokens <= max_tokens {
        return value.clone();
    }

    match value {
        Value::String(s) => Value::String(truncate_string(estimator, s, max_tokens)),
        Value::Array(items) => {
            let note = truncation_note(tokens, max_tokens);
            let candidates = [
                json!({"type": "array", "length": items.len(), "note": note}),
                json!({"type": "array", "length": items.len()}),
            ];
            smallest_summary(estimator, value, tokens, max_tokens, candidates)
        }
        Value::Object(map) => {
            let note = truncation_note(tokens, max_tokens);
            let keys: Vec<String> = map.keys().take(SUMMARY_KEY_LIMIT).cloned().collect();
            let candidates = [
                json!({"type": "object", "key_count": map.len(), "keys": keys, "note": note}),
                json!({"type": "object", "key_count": map.len(), "keys": keys}),
                json!({"type": "object", "key_count": map.len()}),
            ];
            smallest_summary(estimator, value, tokens, max_tokens, candidates)
        }
        other => other.clone(),
    }
}

fn truncation_note(tokens: usize, max_tokens: usize) -> String {
    format!(
        "Output truncated: about {} tokens exceeds the {}-token limit",
        tokens, max_tokens
    )
}

/// First summary that fits; otherwise the cheapest one if it still beats
/// the original, else the original.
fn smallest_summary<const N: usize>(
    estimator: &dyn TokenEstimator,
    original: &Value,
    original_tokens: usize,
    max_tokens: usize,
    candidates: [Value; N],
) -> Value {
    let mut cheapest: Option<(usize, Value)> = None;
    for candidate in candidates {
        let cost = estimator.estimate(&candidate.to_string(), ContentType::Code);
        if cost <= max_tokens {
            return candidate;
        }
        if cheapest.as_ref().map_or(true, |(best, _)| cost < *best) {
            cheapest = Some((cost, candidate));
        }
    }
    match cheapest {
        Some((cost, candidate)) if cost < original_tokens => candidate,
        _ => original.clone(),
    }
}

/// Longest prefix of `s` that, with its marker, fits `max_tokens`. Falls back
/// to a bare prefix when even the marker alone is over budget.
fn truncate_string(estimator: &dyn TokenEstimator, s: &str, max_tokens: usize) -> String {
    let chars: Vec<char> = s.chars().collect();
    let total = chars.len();
    let head = |keep: usize| chars[..keep].iter().collect::<String>();
    let marked = |keep: usize| {
        format!(
            "{}\n[truncated: showing {} of {} characters]",
            head(keep),
            keep,
            total
        )
    };
    let fits = |text: &str| {
        text.chars().count() < total && estimator.estimate(text, ContentType::Code) <= max_tokens
    };

    if let Some(keep) = longest_fitting(total, |keep| fits(&marked(keep))) {
        return marked(keep);
    }
    longest_fitting(total, |keep| fits(&head(keep)))
        .map(head)
        .unwrap_or_default()
}

/// Largest `keep` in `0..limit` accepted by `fits`, assuming acceptance is
/// monotone in `keep`.
fn longest_fitting(limit: usize, fits: impl Fn(usize) -> bool) -> Option<usize> {
    if limit == 0 || !fits(0) {
        return None;
    }
    let (mut lo, mut hi) = (0, limit - 1);
    while lo < hi {
        let mid = lo + (hi - lo + 1) / 2;
        if fits(mid) {
            lo = mid;
        } else {
            hi = mid - 1;
        }
    }
    Some(lo)
}

/// Whether a tool output is large enough that it should be written to
/// memory rather than kept inline.
pub fn should_auto_store(value: &Value, threshold_tokens: usize) -> bool {
    HeuristicEstimator::new().estimate(&value_text(value), ContentType::Code) > threshold_tokens
}

#[cfg(test)]
mod tests {
    use super::*;
    use ctxwarden_core::estimate_tokens;

    #[test]
    fn test_within_budget_unchanged() {
        let value = json!({"a": 1});
        assert_eq!(truncate_tool_output(&value, 100), value);
    }

    #[test]
    fn test_string_is_cut_and_marked() {
        let value = json!("é".repeat(1000));
        let out = truncate_tool_output(&value, 50);
        let text = out.as_str().unwrap();
        assert!(text.starts_with(&"é".repeat(106)));
        assert!(!text.starts_with(&"é".repeat(107)));
        assert!(text.ends_with("[truncated: showing 106 of 1000 characters]"));
        assert_eq!(estimate_tokens(text, ContentType::Code), 50);
    }

    #[test]
    fn test_marker_dropped_when_it_cannot_fit() {
        let out = truncate_tool_output(&json!("x".repeat(100)), 5);
        assert_eq!(out, json!("x".repeat(15)));
    }

    #[test]
    fn test_calibrated_estimator_bounds_string() {
        let estimator = HeuristicEstimator::with_calibration(Some(2.0));
        let input = "y".repeat(500);
        let out = truncate_tool_output_with(&estimator, &json!(input), 200);
        let text = out.as_str().unwrap();
        assert!(estimator.estimate(text, ContentType::Code) <= 200);
        assert!(text.chars().count() < input.chars().count());
        assert!(text.contains("[truncated: showing"));
    }

    #[test]
    fn test_array_summary() {
        let value = Value::Array((0..500).map(|i| json!(i)).collect());
        let out = truncate_tool_output(&value, 40);
        assert_eq!(out["type"], "array");
        assert_eq!(out["length"], 500);
        assert!(out["note"].as_str().unwrap().contains("40-token limit"));
    }

    #[test]
    fn test_tight_limit_drops_summary_detail() {
        let value = Value::Array((0..500).map(|i| json!(i)).collect());
        let out = truncate_tool_output(&value, 1);
        assert_eq!(out, json!({"type": "array", "length": 500}));
    }

    #[test]
    fn test_object_summary_lists_leading_keys() {
        let map: serde_json::Map<String, Value> = (0..30)
            .map(|i| (format!("key{:02}", i), json!("v".repeat(20))))
            .collect();
        let out = truncate_tool_output(&Value::Object(map), 200);
        assert_eq!(out["type"], "object");
        assert_eq!(out["key_count"], 30);
        let keys = out["keys"].as_array().unwrap();
        assert_eq!(keys.len(), SUMMARY_KEY_LIMIT);
        assert_eq!(keys[0], "key00");
        assert!(out["note"].is_string());
    }

    #[test]
    fn test_summary_never_larger_than_input() {
        let value = json!([1, 2]);
        assert_eq!(truncate_tool_output(&value, 0), value);
    }

    #[test]
    fn test_scalars_pass_through() {
        assert_eq!(truncate_tool_output(&json!(12345678901234u64), 1), json!(12345678901234u64));
        assert_eq!(truncate_tool_output(&Value::Null, 0), Value::Null);
        assert_eq!(truncate_tool_output(&json!(true), 0), json!(true));
    }

    #[test]
    fn test_should_auto_store() {
        assert!(!should_auto_store(&json!("x".repeat(30)), 10));
        assert!(should_auto_store(&json!("x".repeat(31)), 10));
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn truncated_string_fits_and_shrinks(
                s in ".{0,400}",
                ratio in 0.5f64..6.0,
                max_tokens in 0usize..150,
            ) {
                let estimator = HeuristicEstimator::with_calibration(Some(ratio));
                let before = estimator.estimate(&s, ContentType::Code);
                let out = truncate_tool_output_with(&estimator, &json!(s.clone()), max_tokens);
                let text = out.as_str().unwrap_or_default().to_string();
                let after = estimator.estimate(&text, ContentType::Code);
                prop_assert!(after <= before);
                prop_assert!(text.chars().count() <= s.chars().count());
                if before > max_tokens {
                    prop_assert!(after <= max_tokens);
                }
            }
        }
    }
}
