//! Keyword-table heuristic classification: the last-resort path when every
//! configured provider fails or returns an unusable reply.

use crate::{ClassificationEntry, FunctionTier};

const CODE_KEYWORDS: &[&str] = &[
    "calculate", "compute", "convert", "parse", "validate", "sort", "hash", "encode",
];
const GENERATIVE_KEYWORDS: &[&str] = &[
    "summarize", "translate", "generate", "write", "describe", "compose",
];
const AGENTIC_KEYWORDS: &[&str] = &[
    "research", "investigate", "analyze", "audit", "orchestrate", "crawl",
];
const HUMAN_KEYWORDS: &[&str] = &[
    "approve", "review", "moderate", "verify", "authorize", "sign",
];

fn matches_any(haystack: &str, keywords: &[&str]) -> bool {
    let lower = haystack.to_lowercase();
    keywords.iter().any(|k| lower.contains(k))
}

/// Classify by substring match against the four keyword tables. If both the
/// name and description match the winning tier, confidence is boosted.
pub fn classify_heuristic(name: &str, description: Option<&str>) -> ClassificationEntry {
    let tables: [(FunctionTier, &[&str]); 4] = [
        (FunctionTier::Code, CODE_KEYWORDS),
        (FunctionTier::Generative, GENERATIVE_KEYWORDS),
        (FunctionTier::Agentic, AGENTIC_KEYWORDS),
        (FunctionTier::Human, HUMAN_KEYWORDS),
    ];

    let description = description.unwrap_or("");

    for (kind, keywords) in tables {
        let name_hits = matches_any(name, keywords);
        let desc_hits = matches_any(description, keywords);
        if name_hits || desc_hits {
            let confidence = if name_hits && desc_hits { 0.8 } else { 0.6 };
            return ClassificationEntry {
                kind,
                confidence,
                reasoning: format!("keyword match against {} tier vocabulary", kind.as_str()),
                provider: "fallback".into(),
                latency_ms: 0,
            };
        }
    }

    ClassificationEntry {
        kind: FunctionTier::Code,
        confidence: 0.5,
        reasoning: "no keyword match, defaulting to code".into(),
        provider: "fallback".into(),
        latency_ms: 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_code_keyword() {
        let entry = classify_heuristic("calculate_tax", None);
        assert_eq!(entry.kind, FunctionTier::Code);
        assert_eq!(entry.provider, "fallback");
    }

    #[test]
    fn matches_generative_keyword() {
        let entry = classify_heuristic("summarize_article", None);
        assert_eq!(entry.kind, FunctionTier::Generative);
    }

    #[test]
    fn matches_agentic_keyword() {
        let entry = classify_heuristic("research_company", None);
        assert_eq!(entry.kind, FunctionTier::Agentic);
    }

    #[test]
    fn matches_human_keyword() {
        let entry = classify_heuristic("approve_refund", None);
        assert_eq!(entry.kind, FunctionTier::Human);
    }

    #[test]
    fn boosts_confidence_when_name_and_description_agree() {
        let entry = classify_heuristic("audit_logs", Some("analyze and audit the system"));
        assert_eq!(entry.confidence, 0.8);
    }

    #[test]
    fn single_match_has_lower_confidence() {
        let entry = classify_heuristic("audit_logs", None);
        assert_eq!(entry.confidence, 0.6);
    }

    #[test]
    fn no_match_defaults_to_code_at_half_confidence() {
        let entry = classify_heuristic("frobnicate", Some("does a thing"));
        assert_eq!(entry.kind, FunctionTier::Code);
        assert_eq!(entry.confidence, 0.5);
    }
}
