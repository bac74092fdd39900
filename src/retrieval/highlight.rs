//! Heuristic snippet highlighter

use ahash::AHashSet;
use regex::RegexBuilder;

const WINDOW_WORDS: usize = 10;
const SNIPPET_WORDS: usize = 20;
const PREVIEW_CHARS: usize = 200;

/// Distinct lowercased query terms longer than two characters, in query order
pub fn query_terms(query: &str) -> Vec<String> {
    let mut seen = AHashSet::new();
    query
        .to_lowercase()
        .split_whitespace()
        .filter(|term| term.chars().count() > 2)
        .filter(|term| seen.insert(term.to_string()))
        .map(str::to_string)
        .collect()
}

/// Pick the 10-word window of `text` containing the most distinct query terms,
/// widen it to 20 words, bold the matches and wrap it in ellipses.
///
/// Ties go to the earliest window. With no matching window the first 200
/// characters are returned instead.
pub fn highlight(query: &str, text: &str) -> String {
    let terms = query_terms(query);
    let words: Vec<&str> = text.split_whitespace().collect();

    let last_start = words.len().saturating_sub(WINDOW_WORDS);
    let mut best_start = 0;
    let mut best_score = 0;

    if !terms.is_empty() {
        for start in 0..=last_start {
            let end = (start + WINDOW_WORDS).min(words.len());
            let window = words[start..end].join(" ").to_lowercase();
            let score = terms.iter().filter(|t| window.contains(t.as_str())).count();
            if score > best_score {
                best_score = score;
                best_start = start;
            }
        }
    }

    if best_score == 0 {
        let preview: String = text.chars().take(PREVIEW_CHARS).collect();
        return format!("{}...", preview);
    }

    let end = (best_start + SNIPPET_WORDS).min(words.len());
    let snippet = words[best_start..end].join(" ");
    format!("...{}...", bold_terms(&snippet, &terms))
}

fn bold_terms(snippet: &str, terms: &[String]) -> String {
    let mut sorted: Vec<&String> = terms.iter().collect();
    // longest first so overlapping terms wrap the widest match
    sorted.sort_by_key(|t| std::cmp::Reverse(t.len()));

    let pattern = sorted
        .iter()
        .map(|t| regex::escape(t))
        .collect::<Vec<_>>()
        .join("|");

    match RegexBuilder::new(&pattern).case_insensitive(true).build() {
        Ok(re) => re.replace_all(snippet, "**$0**").into_owned(),
        Err(e) => {
            tracing::debug!("Highlight pattern rejected: {}", e);
            snippet.to_string()
        }
    }
}
