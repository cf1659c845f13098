//! Prompt text for the two answering modes.

pub const COMPLIANCE_SYSTEM_PROMPT: &str = "You are a legal compliance expert. Provide accurate, \
professional responses based only on the provided policy documents. Keep responses concise and \
focus on the key compliance points.";

pub const GENERAL_SYSTEM_PROMPT: &str = "You are a helpful AI assistant. Provide clear, concise, \
and helpful responses. Keep answers brief and to the point unless asked for more detail.";

pub const INSUFFICIENT_CONTEXT: &str =
    "The provided excerpts do not contain enough information to answer this question";

pub const NO_RELEVANT_CONTEXT: &str = "No relevant information found in the provided documents";

/// Strict-grounding prompt: numbered excerpts, the rules that bind the model
/// to them, the question, and the expected answer shape.
pub fn build_compliance_prompt(query: &str, excerpts: &[String]) -> String {
    let mut prompt = String::new();

    prompt.push_str(
        "You are a specialized legal compliance assistant. Your ONLY task is to answer compliance \
questions using EXCLUSIVELY the provided policy document excerpts below.\n\n",
    );

    prompt.push_str("STRICT RULES:\n");
    prompt.push_str("1. Use ONLY information found in the excerpts below\n");
    prompt.push_str(&format!(
        "2. If the excerpts don't contain sufficient information, clearly state: '{}'\n",
        INSUFFICIENT_CONTEXT
    ));
    prompt.push_str("3. NEVER add external knowledge, assumptions, or general legal advice\n");
    prompt.push_str("4. Quote specific text from excerpts when possible\n");
    prompt.push_str(&format!(
        "5. If no excerpts relate to the question, respond: '{}'\n\n",
        NO_RELEVANT_CONTEXT
    ));

    prompt.push_str("PROVIDED POLICY EXCERPTS:\n");
    prompt.push_str(&"=".repeat(50));
    prompt.push('\n');
    for (i, excerpt) in excerpts.iter().enumerate() {
        prompt.push_str(&format!("[EXCERPT {}]\n{}\n", i + 1, excerpt));
        prompt.push_str(&"-".repeat(30));
        prompt.push('\n');
    }
    prompt.push_str(&"=".repeat(50));
    prompt.push_str("\n\n");

    prompt.push_str(&format!("USER QUESTION: {}\n\n", query));

    prompt.push_str("RESPONSE FORMAT:\n");
    prompt.push_str("- Start with a direct answer if found in excerpts\n");
    prompt.push_str("- Quote relevant text: \"According to [Excerpt X]: [quoted text]\"\n");
    prompt.push_str("- End with specific section/clause references if applicable\n");
    prompt.push_str("- Use professional, compliance-focused language\n\n");

    prompt.push_str("ANSWER (based ONLY on the excerpts above):\n");
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn excerpts_are_numbered_in_order() {
        let excerpts = vec!["First policy text.".to_string(), "Second policy text.".to_string()];
        let prompt = build_compliance_prompt("Can I work remotely?", &excerpts);
        let first = prompt.find("[EXCERPT 1]\nFirst policy text.").unwrap();
        let second = prompt.find("[EXCERPT 2]\nSecond policy text.").unwrap();
        assert!(first < second);
        assert!(prompt.contains("USER QUESTION: Can I work remotely?"));
    }

    #[test]
    fn grounding_rules_are_present() {
        let prompt = build_compliance_prompt("q", &[]);
        assert!(prompt.contains("Use ONLY information found in the excerpts"));
        assert!(prompt.contains(INSUFFICIENT_CONTEXT));
        assert!(prompt.contains("NEVER add external knowledge"));
        assert!(prompt.ends_with("ANSWER (based ONLY on the excerpts above):\n"));
    }
}
