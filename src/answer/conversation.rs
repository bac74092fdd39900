//! Follow-up question expansion

use serde::{Deserialize, Serialize};

const HISTORY_TURNS: usize = 2;
const ANSWER_PREVIEW_CHARS: usize = 200;

/// One prior question/answer exchange
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub question: String,
    pub answer: String,
}

/// Prefix `question` with the last two exchanges so retrieval sees the thread
pub fn build_follow_up(question: &str, history: &[ConversationTurn]) -> String {
    if history.is_empty() {
        return question.to_string();
    }

    let recent = &history[history.len().saturating_sub(HISTORY_TURNS)..];
    let mut lines = Vec::with_capacity(recent.len() * 2 + 1);
    for turn in recent {
        let preview: String = turn.answer.chars().take(ANSWER_PREVIEW_CHARS).collect();
        lines.push(format!("Previous Q: {}", turn.question));
        lines.push(format!("Previous A: {}...", preview));
    }
    lines.push(format!("Current Q: {}", question));
    lines.join("\n")
}
