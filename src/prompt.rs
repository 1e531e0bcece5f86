//! Prompt composition helpers.

use crate::config::RoleLabels;
use crate::models::{ConversationTurn, Role};

/// Flatten a conversation into one prompt: `"<Label>: <content>"` per turn,
/// in order, followed by a bare assistant cue line.
pub fn flatten_turns(turns: &[ConversationTurn], labels: RoleLabels) -> String {
    let mut prompt = String::new();
    for turn in turns {
        prompt.push_str(labels.label(turn.role));
        prompt.push_str(": ");
        prompt.push_str(&turn.content);
        prompt.push('\n');
    }
    prompt.push_str(labels.label(Role::Assistant));
    prompt.push(':');
    prompt
}

/// Prepend a system context block, separated by a blank line.
pub fn with_system_context(context: Option<&str>, prompt: &str) -> String {
    match context.filter(|c| !c.trim().is_empty()) {
        Some(context) => format!("{}\n\n{}", context, prompt),
        None => prompt.to_string(),
    }
}
