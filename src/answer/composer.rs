//! Builds the numbered context handed to the generator

use crate::records::clean_requirement_text;
use crate::retrieval::RankedResult;

/// Formats ranked results into labelled `[Document N]` blocks
pub struct ContextComposer {
    max_chars: usize,
}

impl ContextComposer {
    pub fn new(max_chars: usize) -> Self {
        Self { max_chars }
    }

    /// Blocks in rank order, separated by a blank line
    ///
    /// When the total exceeds `max_chars`, whole blocks are dropped from the
    /// lowest-ranked end. The top block is always kept so the generator never
    /// sees an empty context for a non-empty result set.
    pub fn compose(&self, results: &[RankedResult]) -> String {
        let blocks: Vec<String> = results
            .iter()
            .enumerate()
            .map(|(i, result)| format_block(i + 1, result))
            .collect();

        let mut kept = blocks.len();
        // blocks end with '\n' and are joined by '\n', giving a blank line between them
        let mut total: usize =
            blocks.iter().map(|b| b.chars().count()).sum::<usize>() + kept.saturating_sub(1);
        while kept > 1 && total > self.max_chars {
            kept -= 1;
            total -= blocks[kept].chars().count() + 1;
        }

        if kept < blocks.len() {
            tracing::debug!(
                "Context truncated to {} of {} blocks ({} chars)",
                kept,
                blocks.len(),
                total
            );
        }

        blocks[..kept].join("\n")
    }
}

fn format_block(index: usize, result: &RankedResult) -> String {
    let m = &result.metadata;
    format!(
        "[Document {}]\n\
         Source: {} - Sheet: {}\n\
         RFP: {} (Bank: {})\n\
         Product/Module: {}\n\
         Category: {}\n\
         Content:\n{}\n\
         Relevance Score: {:.2}\n",
        index,
        m.file_name,
        m.sheet_name,
        m.rfp_name,
        m.bank_name,
        m.product,
        m.requirement_category,
        clean_requirement_text(&m.requirement),
        result.relevance_score
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::sample_metadata;

    fn ranked(product: &str, text: &str, score: f32) -> RankedResult {
        RankedResult {
            record_id: format!("rec-{}", product),
            document_id: "doc-1".to_string(),
            metadata: sample_metadata(product, text),
            relevance_score: score,
            highlight: String::new(),
        }
    }

    #[test]
    fn test_block_layout() {
        let out = ContextComposer::new(10_000).compose(&[ranked(
            "Core",
            "Unnamed: 1: Supports SMS alerts | Unnamed: 2: Retail",
            0.876,
        )]);

        assert_eq!(
            out,
            "[Document 1]\n\
             Source: rfp.xlsx - Sheet: Sheet1\n\
             RFP: Core Banking RFP (Bank: Acme Bank)\n\
             Product/Module: Core\n\
             Category: Must Have\n\
             Content:\nRequirement: Supports SMS alerts\nDepartment/Category: Retail\n\
             Relevance Score: 0.88\n"
        );
    }

    #[test]
    fn test_blocks_numbered_and_separated() {
        let out = ContextComposer::new(10_000).compose(&[
            ranked("Core", "first requirement", 0.9),
            ranked("Cards", "second requirement", 0.8),
        ]);

        assert!(out.starts_with("[Document 1]"));
        assert!(out.contains("Relevance Score: 0.90\n\n[Document 2]"));
        assert!(!out.contains("Unnamed:"));
    }

    #[test]
    fn test_lowest_ranked_dropped_first() {
        let results = vec![
            ranked("Core", &"a".repeat(100), 0.9),
            ranked("Cards", &"b".repeat(100), 0.8),
            ranked("Loans", &"c".repeat(100), 0.7),
        ];
        let full = ContextComposer::new(usize::MAX).compose(&results);
        let two = ContextComposer::new(full.chars().count() - 1).compose(&results);

        assert!(two.contains("[Document 2]"));
        assert!(!two.contains("[Document 3]"));

        let one = ContextComposer::new(10).compose(&results);
        assert!(one.contains("[Document 1]"));
        assert!(!one.contains("[Document 2]"));
    }

    #[test]
    fn test_empty_results() {
        assert_eq!(ContextComposer::new(100).compose(&[]), "");
    }
}
