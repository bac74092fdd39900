//! Deterministic keyword search used when the semantic pipeline cannot run

use super::query_terms;
use crate::records::{clean_for_display, RequirementRecord};
use serde::{Deserialize, Serialize};

const PREVIEW_CHARS: usize = 200;

/// Which call site triggered the fallback; each carries its own fixed confidence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FallbackPath {
    /// No semantic pipeline exists, or it failed at the connection level
    LastResort,
    /// The semantic pipeline is present but a backend reported itself unavailable
    Degraded,
}

impl FallbackPath {
    pub fn confidence(self) -> f32 {
        match self {
            Self::LastResort => 0.5,
            Self::Degraded => 0.6,
        }
    }

    pub fn note(self) -> &'static str {
        match self {
            Self::LastResort => {
                "Using simple keyword search. Semantic search requires an embedding provider."
            }
            Self::Degraded => "Using simple keyword search. AI-powered analysis unavailable.",
        }
    }
}

/// A matched record as shown to the user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FallbackSource {
    pub record_id: String,
    pub document_id: String,
    pub product: String,
    pub requirement: String,
    pub requirement_category: String,
    pub response_category: String,
    pub sheet_name: String,
    pub file_name: String,
    pub rfp_name: String,
    pub bank_name: String,
}

impl From<&RequirementRecord> for FallbackSource {
    fn from(record: &RequirementRecord) -> Self {
        let f = &record.fields;
        Self {
            record_id: record.id.clone(),
            document_id: record.document_id.clone(),
            product: f.product.clone(),
            requirement: clean_for_display(&f.requirement),
            requirement_category: f.requirement_category.to_string(),
            response_category: f.response_category.to_string(),
            sheet_name: f.sheet_name.clone(),
            file_name: f.file_name.clone(),
            rfp_name: f.rfp_name.clone(),
            bank_name: f.bank_name.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FallbackOutcome {
    SimpleSearch {
        answer: String,
        sources: Vec<FallbackSource>,
        confidence: f32,
        note: String,
    },
    NoResults {
        answer: String,
    },
}

impl FallbackOutcome {
    pub fn answer(&self) -> &str {
        match self {
            Self::SimpleSearch { answer, .. } | Self::NoResults { answer } => answer,
        }
    }
}

/// Substring search over requirement text; a filter, not a ranker
pub struct KeywordSearcher {
    path: FallbackPath,
}

impl KeywordSearcher {
    pub fn new(path: FallbackPath) -> Self {
        Self { path }
    }

    pub fn path(&self) -> FallbackPath {
        self.path
    }

    /// Records whose requirement contains any query term longer than two
    /// characters, case-insensitively, in corpus order and capped at `limit`
    pub fn search(
        &self,
        question: &str,
        corpus: &[RequirementRecord],
        limit: usize,
    ) -> FallbackOutcome {
        let terms = query_terms(question);
        if terms.is_empty() {
            return FallbackOutcome::NoResults {
                answer: "Please provide more specific search terms (at least 3 characters each)."
                    .to_string(),
            };
        }

        let sources: Vec<FallbackSource> = corpus
            .iter()
            .filter(|record| {
                let text = record.fields.requirement.to_lowercase();
                terms.iter().any(|t| text.contains(t.as_str()))
            })
            .take(limit)
            .map(FallbackSource::from)
            .collect();

        tracing::debug!(
            "Keyword fallback matched {} of {} records ({:?})",
            sources.len(),
            corpus.len(),
            self.path
        );

        if sources.is_empty() {
            return FallbackOutcome::NoResults {
                answer: format!(
                    "No RFP entries found matching '{}'. Try different keywords.",
                    question
                ),
            };
        }

        FallbackOutcome::SimpleSearch {
            answer: format_summary(question, &sources),
            sources,
            confidence: self.path.confidence(),
            note: self.path.note().to_string(),
        }
    }
}

fn format_summary(question: &str, sources: &[FallbackSource]) -> String {
    let mut parts = vec![format!(
        "Found {} relevant RFP entries for '{}':\n",
        sources.len(),
        question
    )];

    for (idx, source) in sources.iter().enumerate() {
        let preview: String = source.requirement.chars().take(PREVIEW_CHARS).collect();
        let ellipsis = if source.requirement.chars().count() > PREVIEW_CHARS {
            "..."
        } else {
            ""
        };
        parts.push(format!(
            "\n{}. **{}** - {}\n   {}{}",
            idx + 1,
            source.product,
            source.requirement_category,
            preview,
            ellipsis
        ));
    }

    parts.push(
        "\n\nNote: this is a simple keyword search. Configure an embedding and chat provider \
         for AI-powered analysis."
            .to_string(),
    );
    parts.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::sample_metadata;

    fn record(id: &str, product: &str, text: &str) -> RequirementRecord {
        RequirementRecord {
            id: id.to_string(),
            document_id: "doc-1".to_string(),
            fields: sample_metadata(product, text),
        }
    }

    fn corpus() -> Vec<RequirementRecord> {
        vec![
            record("1", "Core", "Interest accrual computed daily"),
            record("2", "Alerts", "Supports SMS alerts for every transaction"),
            record("3", "Cards", "Card blocking through mobile banking"),
            record("4", "Alerts", "Email ALERT digest"),
        ]
    }

    #[test]
    fn test_or_across_terms_in_corpus_order() {
        let outcome = KeywordSearcher::new(FallbackPath::Degraded).search(
            "sms alert mobile",
            &corpus(),
            10,
        );
        match outcome {
            FallbackOutcome::SimpleSearch {
                sources,
                confidence,
                ..
            } => {
                let ids: Vec<&str> = sources.iter().map(|s| s.record_id.as_str()).collect();
                assert_eq!(ids, vec!["2", "3", "4"]);
                assert_eq!(confidence, 0.6);
            }
            other => panic!("expected simple-search, got {:?}", other),
        }
    }

    #[test]
    fn test_limit_caps_matches() {
        let outcome =
            KeywordSearcher::new(FallbackPath::LastResort).search("alert", &corpus(), 1);
        match outcome {
            FallbackOutcome::SimpleSearch {
                sources,
                confidence,
                note,
                ..
            } => {
                assert_eq!(sources.len(), 1);
                assert_eq!(sources[0].record_id, "2");
                assert_eq!(confidence, 0.5);
                assert!(note.contains("keyword search"));
            }
            other => panic!("expected simple-search, got {:?}", other),
        }
    }

    #[test]
    fn test_common_word_still_matches_by_substring() {
        let corpus = vec![
            record("1", "Core", "Other modules integrate"),
            record("2", "Core", "Batch jobs"),
        ];
        let outcome = KeywordSearcher::new(FallbackPath::LastResort).search("the", &corpus, 10);
        match outcome {
            FallbackOutcome::SimpleSearch { sources, .. } => {
                assert_eq!(sources.len(), 1);
                assert_eq!(sources[0].record_id, "1");
            }
            other => panic!("expected simple-search, got {:?}", other),
        }
    }

    #[test]
    fn test_short_question_needs_more_terms() {
        for question in ["", "is", "a to of"] {
            let outcome =
                KeywordSearcher::new(FallbackPath::LastResort).search(question, &corpus(), 10);
            assert!(matches!(outcome, FallbackOutcome::NoResults { .. }));
            assert!(outcome.answer().contains("more specific"));
        }
    }

    #[test]
    fn test_no_matches() {
        let outcome =
            KeywordSearcher::new(FallbackPath::Degraded).search("swift gateway", &corpus(), 10);
        assert!(matches!(outcome, FallbackOutcome::NoResults { .. }));
    }

    #[test]
    fn test_summary_format_and_cleaning() {
        let long = format!("Unnamed: 1: {} | Unnamed: 2: Retail", "sms ".repeat(80));
        let corpus = vec![record("1", "Alerts", &long)];
        let outcome = KeywordSearcher::new(FallbackPath::Degraded).search("sms", &corpus, 10);

        let FallbackOutcome::SimpleSearch { answer, sources, .. } = outcome else {
            panic!("expected simple-search");
        };
        assert!(!sources[0].requirement.contains("Unnamed:"));
        assert!(sources[0].requirement.ends_with("| Retail"));
        assert!(answer.starts_with("Found 1 relevant RFP entries for 'sms':\n"));
        assert!(answer.contains("\n1. **Alerts** - Must Have\n   sms sms"));
        assert!(answer.contains("..."));
    }
}
