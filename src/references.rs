use regex::Regex;
use std::sync::OnceLock;

static REFERENCE_PATTERN: OnceLock<Regex> = OnceLock::new();

fn reference_pattern() -> &'static Regex {
    REFERENCE_PATTERN.get_or_init(|| {
        Regex::new(r"(?i)\b(?:clause|section|article|paragraph)\s+\d+(?:\.\d+)*")
            .unwrap_or_else(|e| panic!("reference pattern must compile: {e}"))
    })
}

/// Finds "Clause 5.2" / "Section 3" style references in first-occurrence
/// order, collapsing exact duplicates. A sentence-final period is not part
/// of the numeral.
pub fn extract_references(text: &str) -> Vec<String> {
    let mut found: Vec<String> = Vec::new();
    for m in reference_pattern().find_iter(text) {
        let reference = m.as_str().trim();
        if !found.iter().any(|r| r == reference) {
            found.push(reference.to_string());
        }
    }
    found
}

/// Appends the references in `extra` that `into` does not hold yet.
pub fn merge_references(into: &mut Vec<String>, extra: &[String]) {
    for reference in extra {
        if !into.contains(reference) {
            into.push(reference.clone());
        }
    }
}
