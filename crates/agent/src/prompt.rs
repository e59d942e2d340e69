//! System-prompt assembly.

/// Append the available-tools block to a base system prompt.
///
/// Tools are listed alphabetically as `- <name>: <description>`, followed by
/// an instruction describing the JSON fallback shape for providers without
/// native tool calling. A prompt with no registered tools is returned
/// unchanged.
pub fn augment_system_prompt(base: &str, tools: &[(String, String)]) -> String {
    if tools.is_empty() {
        return base.to_string();
    }

    let mut sorted: Vec<_> = tools.to_vec();
    sorted.sort_by(|a, b| a.0.cmp(&b.0));

    let mut prompt = String::from(base);
    prompt.push_str("\n\nAvailable tools:\n");
    for (name, description) in &sorted {
        prompt.push_str("- ");
        prompt.push_str(name);
        prompt.push_str(": ");
        prompt.push_str(description);
        prompt.push('\n');
    }
    prompt.push_str(
        "\nTo invoke a tool without native tool calling, respond with a single \
         JSON object of the form {\"name\": \"...\", \"arguments\": {...}}.",
    );
    prompt
}
