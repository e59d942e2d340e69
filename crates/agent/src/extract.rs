//! Content-embedded tool-call extraction.
//!
//! Some providers never emit structured tool calls: the invocation arrives
//! as plain assistant text. Two dialects are recognized, tried in order:
//!
//! - **Channel markup** (gated by configuration): `<|channel|>`-delimited
//!   turns where the `commentary` channel carries `to=functions.<name>`
//!   followed by a JSON object payload. The `analysis` channel is hidden
//!   reasoning and is discarded; `final` is user-visible text.
//! - **Bare JSON**: the whole message — or any substring of it — shaped like
//!   `{"name": "...", "arguments": {...}, "id"?: "..."}`.
//!
//! JSON payloads are isolated by brace-balanced scanning, not regex, so
//! nested objects are handled. Extracted arguments go through the
//! normalizer; missing ids are generated.

use serde_json::Value;

use ferrite_core::callid::generate_call_id;
use ferrite_core::message::ToolCall;

use crate::normalize::normalize_arguments;

const CHANNEL: &str = "<|channel|>";
const MESSAGE: &str = "<|message|>";
const END: &str = "<|end|>";
const CALL: &str = "<|call|>";
const START: &str = "<|start|>";
const FUNCTION_PREFIX: &str = "to=functions.";

/// Extract tool calls from assistant free-text.
///
/// Returns an empty list when the text contains no recognizable invocation;
/// the caller then treats the text as a normal answer. When channel markers
/// are present (and the dialect is enabled) the markup parse is
/// authoritative: falling back to the JSON scanner would resurrect payloads
/// from the discarded `analysis` channel.
pub fn extract_tool_calls(content: &str, channel_markup: bool) -> Vec<ToolCall> {
    if channel_markup && content.contains(CHANNEL) {
        return parse_channel_markup(content);
    }
    parse_bare_json(content)
}

// ── Channel-markup dialect ────────────────────────────────────────────────

fn parse_channel_markup(content: &str) -> Vec<ToolCall> {
    let mut calls = Vec::new();
    let mut rest = content;

    while let Some(start) = rest.find(CHANNEL) {
        let segment = &rest[start + CHANNEL.len()..];
        let Some(message_at) = segment.find(MESSAGE) else {
            break;
        };
        let header = &segment[..message_at];
        let body = &segment[message_at + MESSAGE.len()..];
        let payload = &body[..segment_end(body)];

        let channel = header.split_whitespace().next().unwrap_or("");
        if channel == "commentary"
            && let Some(name) = function_name(header)
            && let Some(object) = balanced_object_in(payload)
            && serde_json::from_str::<Value>(object)
                .map(|v| v.is_object())
                .unwrap_or(false)
        {
            let (_, canonical) = normalize_arguments(object);
            calls.push(ToolCall::new(generate_call_id(), name, canonical));
        }
        // `analysis` (hidden reasoning) and `final` (user-visible text)
        // carry no tool calls.

        rest = body;
    }

    calls
}

/// Distance to the first terminator marker, or the full length.
fn segment_end(body: &str) -> usize {
    [CALL, END, START, CHANNEL]
        .iter()
        .filter_map(|marker| body.find(marker))
        .min()
        .unwrap_or(body.len())
}

fn function_name(header: &str) -> Option<&str> {
    let at = header.find(FUNCTION_PREFIX)?;
    let name = &header[at + FUNCTION_PREFIX.len()..];
    let end = name
        .find(|c: char| c.is_whitespace() || c == '<')
        .unwrap_or(name.len());
    let name = &name[..end];
    (!name.is_empty()).then_some(name)
}

// ── Bare-JSON dialect ─────────────────────────────────────────────────────

fn parse_bare_json(content: &str) -> Vec<ToolCall> {
    // Attempt 1: the whole (trimmed) text is one invocation object.
    if let Some(call) = call_from_object_text(content.trim()) {
        return vec![call];
    }

    // Attempt 2: scan for invocation objects anywhere in the text.
    let mut calls = Vec::new();
    let mut from = 0;
    while let Some(open_rel) = content[from..].find('{') {
        let open = from + open_rel;
        let Some(end) = balanced_end(content, open) else {
            break;
        };
        if let Some(call) = call_from_object_text(&content[open..end]) {
            calls.push(call);
            from = end;
        } else {
            from = open + 1;
        }
    }
    calls
}

/// Parse one `{"name": ..., "arguments": ..., "id"?: ...}` object.
fn call_from_object_text(text: &str) -> Option<ToolCall> {
    let value: Value = serde_json::from_str(text).ok()?;
    let object = value.as_object()?;
    let name = object
        .get("name")?
        .as_str()
        .filter(|s| !s.is_empty())?
        .to_string();

    let raw_arguments = match object.get("arguments") {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => "{}".into(),
    };
    let (_, canonical) = normalize_arguments(&raw_arguments);

    let id = object
        .get("id")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(String::from)
        .unwrap_or_else(generate_call_id);

    Some(ToolCall::new(id, name, canonical))
}

/// The first balanced JSON object inside `text`, if any.
fn balanced_object_in(text: &str) -> Option<&str> {
    let open = text.find('{')?;
    let end = balanced_end(text, open)?;
    Some(&text[open..end])
}

/// End index (exclusive) of the balanced object opening at `open`.
///
/// Tracks string and escape state so braces inside string literals do not
/// count.
fn balanced_end(text: &str, open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text[open..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(open + i + c.len_utf8());
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whole_text_invocation() {
        let content = r#"{"name":"wikipedia","arguments":{"input":"Tunguska incident"}}"#;
        let calls = extract_tool_calls(content, false);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "wikipedia");
        assert_eq!(calls[0].arguments, r#"{"input":"Tunguska incident"}"#);
        assert!(calls[0].id.starts_with("call_"));
    }

    #[test]
    fn explicit_id_is_preserved() {
        let content = r#"{"name":"calc","arguments":{},"id":"call_fixed"}"#;
        let calls = extract_tool_calls(content, false);
        assert_eq!(calls[0].id, "call_fixed");
    }

    #[test]
    fn string_wrapped_arguments_are_normalized() {
        let content = r#"{"name":"bash","arguments":"{\"command\":\"date\"}"}"#;
        let calls = extract_tool_calls(content, false);
        assert_eq!(calls[0].arguments, r#"{"command":"date"}"#);
    }

    #[test]
    fn embedded_invocations_are_scanned() {
        let content = concat!(
            "I'll look that up.\n",
            r#"{"name":"web_search","arguments":{"query":"rust"}}"#,
            "\nand also\n",
            r#"{"name":"calculator","arguments":{"expression":"2+2"}}"#,
        );
        let calls = extract_tool_calls(content, false);
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].name, "web_search");
        assert_eq!(calls[1].name, "calculator");
    }

    #[test]
    fn plain_prose_yields_nothing() {
        assert!(extract_tool_calls("The answer is 5.", false).is_empty());
        assert!(extract_tool_calls("", false).is_empty());
    }

    #[test]
    fn json_without_name_is_not_an_invocation() {
        let content = r#"Here is data: {"result": 42, "unit": "kg"}"#;
        assert!(extract_tool_calls(content, false).is_empty());
    }

    #[test]
    fn nested_braces_in_arguments() {
        let content = r#"{"name":"file_write","arguments":{"path":"a.json","content":"{\"k\":{\"v\":1}}"}}"#;
        let calls = extract_tool_calls(content, false);
        assert_eq!(calls.len(), 1);
        assert_eq!(
            calls[0].parsed_arguments()["content"],
            r#"{"k":{"v":1}}"#
        );
    }

    #[test]
    fn channel_markup_commentary_call() {
        let content = "<|channel|>analysis<|message|>Need the current date.<|end|>\
                       <|start|>assistant<|channel|>commentary to=functions.bash\
                       <|message|>{\"command\":\"date\"}<|call|>";
        let calls = extract_tool_calls(content, true);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "bash");
        assert_eq!(calls[0].arguments, r#"{"command":"date"}"#);
    }

    #[test]
    fn channel_markup_requires_the_flag() {
        let content =
            "<|channel|>commentary to=functions.bash<|message|>{\"command\":\"date\"}<|call|>";
        assert!(extract_tool_calls(content, false).is_empty());
        assert_eq!(extract_tool_calls(content, true).len(), 1);
    }

    #[test]
    fn channel_markup_analysis_and_final_are_ignored() {
        let content = "<|channel|>analysis<|message|>{\"name\":\"x\"}<|end|>\
                       <|channel|>final<|message|>All done.<|end|>";
        assert!(extract_tool_calls(content, true).is_empty());
    }

    #[test]
    fn channel_markup_nested_json_payload() {
        let content = "<|channel|>commentary to=functions.file_write<|message|>\
                       {\"path\":\"x\",\"meta\":{\"tags\":[\"a\",\"b\"]}}<|call|>";
        let calls = extract_tool_calls(content, true);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].parsed_arguments()["meta"]["tags"][0], "a");
    }

    #[test]
    fn channel_markup_without_function_name_is_skipped() {
        let content = "<|channel|>commentary<|message|>{\"command\":\"date\"}<|call|>";
        assert!(extract_tool_calls(content, true).is_empty());
    }

    #[test]
    fn channel_markup_multiple_commentary_calls() {
        let content = "<|channel|>commentary to=functions.calculator\
                       <|message|>{\"expression\":\"2+3\"}<|call|>\
                       <|channel|>commentary to=functions.web_search\
                       <|message|>{\"query\":\"tunguska\"}<|call|>";
        let calls = extract_tool_calls(content, true);
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].name, "calculator");
        assert_eq!(calls[1].name, "web_search");
    }

    #[test]
    fn balanced_scan_ignores_braces_in_strings() {
        let content = r#"{"name":"echo","arguments":{"text":"a } inside"}}"#;
        let calls = extract_tool_calls(content, false);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].parsed_arguments()["text"], "a } inside");
    }

    #[test]
    fn unbalanced_object_is_not_extracted() {
        let content = r#"broken {"name":"calc","arguments":{"x": "#;
        assert!(extract_tool_calls(content, false).is_empty());
    }
}
