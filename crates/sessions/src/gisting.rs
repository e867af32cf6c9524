//! Marker-based summary extraction and prompt injection.
//!
//! Grounded on `original_source/tests/test_sessions/test_gisting.py` (the
//! module under test, `gisting.py`, was filtered from the retrieval pack;
//! its contract is reconstructed from the assertions the tests make).

use sa_domain::Message;

pub const GIST_MARKER: &str = "---GIST---";

pub const GIST_INSTRUCTION: &str = "\n\nAfter answering, append a line with exactly \
---GIST--- followed by a two-sentence summary of your response.";

/// Appends the gist instruction to a user turn's content.
pub fn inject_gist_instruction(content: &str) -> String {
    format!("{content}{GIST_INSTRUCTION}")
}

/// Finds the *last* `---GIST---` marker in `response` and splits it into
/// `(prefix, gist)`. Returns `(response, None)` if no marker is present, or
/// if the suffix after the last marker is empty/whitespace-only.
pub fn extract_gist(response: &str) -> (String, Option<String>) {
    match response.rfind(GIST_MARKER) {
        None => (response.to_string(), None),
        Some(idx) => {
            let prefix = response[..idx].trim_end().to_string();
            let suffix = response[idx + GIST_MARKER.len()..].trim();
            if suffix.is_empty() {
                (prefix, None)
            } else {
                (prefix, Some(suffix.to_string()))
            }
        }
    }
}

/// Builds the condensation prompt for the summarizer role: every old
/// message rendered as `"<ROLE>: <content>"`, asking for a one-paragraph
/// summary.
pub fn build_condensation_prompt(old_messages: &[Message]) -> String {
    let mut body = String::new();
    for m in old_messages {
        body.push_str(&m.role.as_str().to_uppercase());
        body.push_str(": ");
        body.push_str(&m.content);
        body.push('\n');
    }
    format!(
        "The following is an earlier portion of a conversation between a user \
and an assistant. Summarize it in a single paragraph, preserving any facts, \
decisions, or constraints that later turns may depend on.\n\n{body}\nSUMMARY:"
    )
}

/// Builds the fallback-gist prompt used when the model didn't emit a
/// `---GIST---` marker on its own.
pub fn build_fallback_gist_prompt(response_text: &str) -> String {
    format!(
        "Summarize the following assistant response in a 2-sentence summary, \
capturing what was produced or decided.\n\n{response_text}\n\nSUMMARY:"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inject_gist_instruction_appends_marker_hint() {
        let content = "Write a fibonacci function";
        let result = inject_gist_instruction(content);
        assert!(result.starts_with(content));
        assert!(result.contains(GIST_INSTRUCTION));
        assert!(result.contains("---GIST---"));
    }

    #[test]
    fn extract_gist_with_marker() {
        let response = "Here is the code.\n---GIST---\nThe response provides a fibonacci function.";
        let (content, gist) = extract_gist(response);
        assert_eq!(content, "Here is the code.");
        assert_eq!(gist.as_deref(), Some("The response provides a fibonacci function."));
    }

    #[test]
    fn extract_gist_no_marker() {
        let response = "Here is the code with no gist marker.";
        let (content, gist) = extract_gist(response);
        assert_eq!(content, response);
        assert!(gist.is_none());
    }

    #[test]
    fn extract_gist_multiple_markers_uses_last() {
        let response = "First part\n---GIST---\nFirst gist\n\
More content\n---GIST---\nSecond gist (should use this one)";
        let (content, gist) = extract_gist(response);
        assert_eq!(gist.as_deref(), Some("Second gist (should use this one)"));
        assert!(content.contains("First part"));
        assert!(content.contains("First gist"));
    }

    #[test]
    fn extract_gist_empty_gist() {
        let response = "Some content\n---GIST---\n";
        let (content, gist) = extract_gist(response);
        assert_eq!(content, "Some content");
        assert!(gist.is_none());
    }

    #[test]
    fn extract_gist_whitespace_only_gist() {
        let response = "Some content\n---GIST---\n   \n  ";
        let (content, gist) = extract_gist(response);
        assert_eq!(content, "Some content");
        assert!(gist.is_none());
    }

    #[test]
    fn build_condensation_prompt_renders_roles_uppercase() {
        let messages = vec![Message::user("Write a function"), {
            let mut m = Message::assistant("Here is the function", "m1", 3);
            m.content = "Here is the function".into();
            m
        }];
        let prompt = build_condensation_prompt(&messages);
        assert!(prompt.contains("USER: Write a function"));
        assert!(prompt.contains("ASSISTANT: Here is the function"));
        assert!(prompt.to_lowercase().contains("summar"));
        assert!(prompt.contains("SUMMARY:"));
    }

    #[test]
    fn build_fallback_gist_prompt_contains_response_and_length_hint() {
        let response = "Here is a detailed implementation of the algorithm.";
        let prompt = build_fallback_gist_prompt(response);
        assert!(prompt.contains(response));
        assert!(prompt.contains("2-sentence"));
        assert!(prompt.contains("SUMMARY:"));
    }

    #[test]
    fn injection_then_marker_roundtrip_preserves_prompt() {
        let x = "What's the capital of France?";
        let injected = inject_gist_instruction(x);
        let full_response = format!("{injected}\n---GIST---\nAnswered a geography question.");
        let (content, gist) = extract_gist(&full_response);
        assert!(content.starts_with(x));
        assert_eq!(gist.as_deref(), Some("Answered a geography question."));
    }
}
