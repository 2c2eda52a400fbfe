//! Parses a classifier model's raw reply into a [`ClassificationEntry`].

use crate::FunctionTier;

/// Strip a surrounding fenced code block (```` ```json ... ``` ```` or plain
/// ```` ``` ````), if present.
pub fn unwrap_fenced_block(reply: &str) -> &str {
    let trimmed = reply.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let rest = rest.strip_prefix('\n').unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

#[derive(Debug, Clone)]
pub struct ParsedClassification {
    pub kind: FunctionTier,
    pub confidence: f64,
    pub reasoning: String,
}

/// Parse a model reply: unwrap fences, parse JSON, validate `type`, clamp
/// `confidence` to `[0,1]` (defaulting to 0.5 when absent). Returns `None`
/// when the JSON is malformed or `type` isn't one of the four tiers —
/// callers should fall back to substring inference in that case.
pub fn parse_reply(reply: &str) -> Option<ParsedClassification> {
    let unwrapped = unwrap_fenced_block(reply);
    let value: serde_json::Value = serde_json::from_str(unwrapped).ok()?;

    let kind_str = value.get("type").and_then(|v| v.as_str())?;
    let kind = FunctionTier::from_str(kind_str)?;

    let confidence = value
        .get("confidence")
        .and_then(|v| v.as_f64())
        .unwrap_or(0.5)
        .clamp(0.0, 1.0);

    let reasoning = value
        .get("reasoning")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();

    Some(ParsedClassification { kind, confidence, reasoning })
}

/// When JSON parsing fails entirely, infer the tier by substring match
/// against the four tier keywords themselves (not the heuristic's richer
/// keyword tables), at a fixed confidence of 0.5.
pub fn infer_from_substring(reply: &str) -> Option<ParsedClassification> {
    let lower = reply.to_lowercase();
    for kind in [
        FunctionTier::Code,
        FunctionTier::Generative,
        FunctionTier::Agentic,
        FunctionTier::Human,
    ] {
        if lower.contains(kind.as_str()) {
            return Some(ParsedClassification {
                kind,
                confidence: 0.5,
                reasoning: "inferred from unstructured reply".into(),
            });
        }
    }
    None
}
