//! Question answering entry points: `ask` and `follow_up`
//!
//! Every call yields a well-formed `AskResponse`. Only caller mistakes
//! (question too short, bad sampling parameters) are returned as errors.

use super::composer::ContextComposer;
use super::conversation::{build_follow_up, ConversationTurn};
use super::generator::AnswerGenerator;
use super::openai::build_backend;
use crate::config::{Config, RetrievalConfig};
use crate::embedding::build_provider;
use crate::error::{Result, RfpError};
use crate::records::QueryFilters;
use crate::retrieval::{
    ErrorKind, FallbackOutcome, FallbackPath, FallbackSource, KeywordSearcher, RankedResult,
    RetrievalError, SimilarityRanker,
};
use crate::storage::RecordStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const SUGGESTED_QUESTIONS: [&str; 10] = [
    "What are the main technical requirements?",
    "List all integration requirements",
    "What are the security and compliance requirements?",
    "Summarize the fraud detection specifications",
    "What AI/ML capabilities are required?",
    "What are the performance requirements?",
    "List all third-party integrations needed",
    "What are the data migration requirements?",
    "Summarize the deployment and infrastructure needs",
    "What are the testing and quality assurance requirements?",
];

/// Starter questions offered to users with an empty prompt
pub fn suggest_questions() -> Vec<&'static str> {
    SUGGESTED_QUESTIONS.to_vec()
}

/// Per-request parameters
#[derive(Debug, Clone, PartialEq)]
pub struct AskOptions {
    pub filters: Option<QueryFilters>,
    pub top_n: usize,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl AskOptions {
    pub fn from_config(config: &RetrievalConfig) -> Self {
        Self {
            filters: None,
            top_n: config.top_n,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }

    fn filters(&self) -> Option<&QueryFilters> {
        self.filters.as_ref().filter(|f| !f.is_empty())
    }
}

impl Default for AskOptions {
    fn default() -> Self {
        Self::from_config(&Config::default().retrieval)
    }
}

/// Response shape shared by every path, tagged by `mode`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "kebab-case")]
pub enum AskResponse {
    Intelligent {
        answer: String,
        sources: Vec<RankedResult>,
        confidence: f32,
        model: String,
        total_sources: usize,
        sources_analyzed: usize,
    },
    SimpleSearch {
        answer: String,
        sources: Vec<FallbackSource>,
        confidence: f32,
        note: String,
        fallback: FallbackPath,
    },
    NoResults {
        answer: String,
        confidence: f32,
    },
    Error {
        answer: String,
        confidence: f32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error_kind: Option<ErrorKind>,
    },
}

impl AskResponse {
    pub fn mode(&self) -> &'static str {
        match self {
            Self::Intelligent { .. } => "intelligent",
            Self::SimpleSearch { .. } => "simple-search",
            Self::NoResults { .. } => "no-results",
            Self::Error { .. } => "error",
        }
    }

    pub fn answer(&self) -> &str {
        match self {
            Self::Intelligent { answer, .. }
            | Self::SimpleSearch { answer, .. }
            | Self::NoResults { answer, .. }
            | Self::Error { answer, .. } => answer,
        }
    }

    pub fn confidence(&self) -> f32 {
        match self {
            Self::Intelligent { confidence, .. }
            | Self::SimpleSearch { confidence, .. }
            | Self::NoResults { confidence, .. }
            | Self::Error { confidence, .. } => *confidence,
        }
    }

    fn no_results(answer: impl Into<String>) -> Self {
        Self::NoResults {
            answer: answer.into(),
            confidence: 0.0,
        }
    }

    fn error(message: impl std::fmt::Display, kind: Option<ErrorKind>) -> Self {
        Self::Error {
            answer: format!("I encountered an error processing your question: {}", message),
            confidence: 0.0,
            error_kind: kind,
        }
    }
}

/// Embedding ranker, context composer and generator used for semantic answers
pub struct IntelligentPipeline {
    ranker: SimilarityRanker,
    composer: ContextComposer,
    generator: AnswerGenerator,
}

impl IntelligentPipeline {
    pub fn new(
        ranker: SimilarityRanker,
        composer: ContextComposer,
        generator: AnswerGenerator,
    ) -> Self {
        Self {
            ranker,
            composer,
            generator,
        }
    }

    fn is_configured(&self) -> bool {
        self.ranker.is_configured() && self.generator.is_configured()
    }
}

enum PipelineError {
    Retrieval(RetrievalError),
    Store(RfpError),
}

impl From<RetrievalError> for PipelineError {
    fn from(err: RetrievalError) -> Self {
        Self::Retrieval(err)
    }
}

impl From<RfpError> for PipelineError {
    fn from(err: RfpError) -> Self {
        Self::Store(err)
    }
}

pub struct QaService {
    store: Arc<dyn RecordStore>,
    pipeline: Option<IntelligentPipeline>,
    defaults: AskOptions,
    min_question_chars: usize,
}

impl QaService {
    /// Keyword-only service; add semantic answering with `with_pipeline`
    pub fn new(store: Arc<dyn RecordStore>, config: &RetrievalConfig) -> Self {
        Self {
            store,
            pipeline: None,
            defaults: AskOptions::from_config(config),
            min_question_chars: config.min_question_chars,
        }
    }

    pub fn with_pipeline(mut self, pipeline: IntelligentPipeline) -> Self {
        self.pipeline = Some(pipeline);
        self
    }

    /// Wire backends from configuration
    ///
    /// A disabled embedding provider or disabled generation leaves the service
    /// keyword-only. Backends that are enabled but lack credentials are still
    /// wired and report themselves unconfigured at query time.
    pub fn from_config(config: &Config, store: Arc<dyn RecordStore>) -> Self {
        let service = Self::new(store, &config.retrieval);
        if config.embedding.provider == "disabled" || !config.llm.enabled {
            tracing::info!("Semantic answering disabled, using keyword search only");
            return service;
        }

        let pipeline = IntelligentPipeline::new(
            SimilarityRanker::new(build_provider(&config.embedding)),
            ContextComposer::new(config.retrieval.max_context_chars),
            AnswerGenerator::new(build_backend(&config.llm)),
        );
        service.with_pipeline(pipeline)
    }

    pub fn defaults(&self) -> &AskOptions {
        &self.defaults
    }

    /// Answer `question` over the stored corpus
    pub fn ask(&self, question: &str, options: &AskOptions) -> Result<AskResponse> {
        self.validate(question, options)?;

        let pipeline = match &self.pipeline {
            None => return Ok(self.fallback(question, options, FallbackPath::LastResort)),
            Some(p) if !p.is_configured() => {
                tracing::warn!("Semantic backends not configured, degrading to keyword search");
                return Ok(self.fallback(question, options, FallbackPath::Degraded));
            }
            Some(p) => p,
        };

        let response = match self.answer_intelligently(pipeline, question, options) {
            Ok(response) => response,
            Err(PipelineError::Retrieval(e)) => match e.kind() {
                ErrorKind::Unavailable => {
                    tracing::warn!("Backend unavailable mid-request: {}", e);
                    self.fallback(question, options, FallbackPath::Degraded)
                }
                ErrorKind::Transient => {
                    tracing::warn!("Backend request failed: {}", e);
                    self.fallback(question, options, FallbackPath::LastResort)
                }
                kind => {
                    tracing::warn!("Semantic answering failed: {}", e);
                    AskResponse::error(e, Some(kind))
                }
            },
            Err(PipelineError::Store(e)) => {
                tracing::warn!("Record store failed: {}", e);
                AskResponse::error(e, None)
            }
        };

        tracing::info!(
            "Answered in {} mode (confidence {:.2})",
            response.mode(),
            response.confidence()
        );
        Ok(response)
    }

    /// Answer a follow-up by folding the last exchanges into the query
    pub fn follow_up(
        &self,
        question: &str,
        history: &[ConversationTurn],
        filters: Option<QueryFilters>,
    ) -> Result<AskResponse> {
        let options = AskOptions {
            filters,
            ..self.defaults.clone()
        };
        self.validate(question, &options)?;
        self.ask(&build_follow_up(question, history), &options)
    }

    fn validate(&self, question: &str, options: &AskOptions) -> Result<()> {
        if question.trim().chars().count() < self.min_question_chars {
            return Err(RfpError::Validation(format!(
                "question must be at least {} characters",
                self.min_question_chars
            )));
        }
        if options.top_n == 0 {
            return Err(RfpError::Validation("top_n must be at least 1".to_string()));
        }
        if !(0.0..=1.0).contains(&options.temperature) {
            return Err(RfpError::Validation(format!(
                "temperature must be within [0, 1], got {}",
                options.temperature
            )));
        }
        if options.max_tokens == 0 {
            return Err(RfpError::Validation(
                "max_tokens must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    fn answer_intelligently(
        &self,
        pipeline: &IntelligentPipeline,
        question: &str,
        options: &AskOptions,
    ) -> std::result::Result<AskResponse, PipelineError> {
        let filters = options.filters();
        let corpus = self.store.list_embeddings(filters)?;
        let results = pipeline
            .ranker
            .rank(question, &corpus, options.top_n, filters)?;

        if results.is_empty() {
            return Ok(AskResponse::no_results(
                "I couldn't find any relevant information in the RFP documents for your question.",
            ));
        }

        let context = pipeline.composer.compose(&results);
        let generated = pipeline.generator.generate(
            question,
            &context,
            options.temperature,
            options.max_tokens,
        )?;

        let sources: Vec<RankedResult> = results
            .into_iter()
            .map(RankedResult::for_display)
            .collect();
        Ok(AskResponse::Intelligent {
            answer: generated.answer,
            confidence: generated.confidence,
            model: pipeline.generator.model_name().to_string(),
            total_sources: sources.len(),
            sources_analyzed: options.top_n.min(sources.len()),
            sources,
        })
    }

    fn fallback(&self, question: &str, options: &AskOptions, path: FallbackPath) -> AskResponse {
        let corpus = match self.store.list_records(options.filters()) {
            Ok(corpus) => corpus,
            Err(e) => {
                tracing::warn!("Record store failed during keyword search: {}", e);
                return AskResponse::error(e, None);
            }
        };

        match KeywordSearcher::new(path).search(question, &corpus, options.top_n) {
            FallbackOutcome::SimpleSearch {
                answer,
                sources,
                confidence,
                note,
            } => AskResponse::SimpleSearch {
                answer,
                sources,
                confidence,
                note,
                fallback: path,
            },
            FallbackOutcome::NoResults { answer } => AskResponse::no_results(answer),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::answer::generator::{
        Completion, FinishReason, GenerationError, MockGenerationBackend,
    };
    use crate::embedding::{EmbeddingError, MockEmbeddingProvider};
    use crate::records::{DocumentInfo, RowDraft};
    use crate::storage::Database;
    use chrono::Utc;

    fn store_with(rows: &[(&str, &str)]) -> Arc<Database> {
        let db = Database::in_memory().unwrap();
        let document = DocumentInfo {
            id: "doc-1".to_string(),
            file_name: "rfp.xlsx".to_string(),
            rfp_name: "Core Banking RFP".to_string(),
            bank_name: "Acme Bank".to_string(),
            created_at: Utc::now(),
        };
        db.insert_document(&document).unwrap();
        let records: Vec<_> = rows
            .iter()
            .filter_map(|(product, text)| {
                RowDraft {
                    product: Some(product.to_string()),
                    requirement: Some(text.to_string()),
                    ..Default::default()
                }
                .into_record(&document)
            })
            .collect();
        db.insert_records(&records).unwrap();
        for record in &records {
            let entry = crate::records::EmbeddingEntry::for_record(record, vec![1.0, 0.0]);
            db.upsert_embedding(&entry, "test-model").unwrap();
        }
        Arc::new(db)
    }

    fn embedder(result: std::result::Result<Vec<f32>, EmbeddingError>) -> MockEmbeddingProvider {
        let mut provider = MockEmbeddingProvider::new();
        provider.expect_is_configured().return_const(true);
        provider.expect_embed().returning(move |_| result.clone());
        provider
    }

    fn chat(text: &'static str) -> MockGenerationBackend {
        let mut backend = MockGenerationBackend::new();
        backend.expect_is_configured().return_const(true);
        backend
            .expect_model_name()
            .return_const("gpt-4o".to_string());
        backend.expect_complete().returning(move |_| {
            Ok(Completion {
                text: text.to_string(),
                finish_reason: FinishReason::Stop,
            })
        });
        backend
    }

    fn service(
        store: Arc<Database>,
        provider: MockEmbeddingProvider,
        backend: MockGenerationBackend,
    ) -> QaService {
        let config = Config::default().retrieval;
        QaService::new(store, &config).with_pipeline(IntelligentPipeline::new(
            SimilarityRanker::new(Arc::new(provider)),
            ContextComposer::new(config.max_context_chars),
            AnswerGenerator::new(Arc::new(backend)),
        ))
    }

    #[test]
    fn test_intelligent_answer() {
        let store = store_with(&[("Core", "Unnamed: 1: Supports SMS alerts | Unnamed: 2: Retail")]);
        let qa = service(
            store,
            embedder(Ok(vec![1.0, 0.0])),
            chat("SMS alerts are supported [Document 1]."),
        );

        let response = qa.ask("SMS alert requirements", &AskOptions::default()).unwrap();
        match response {
            AskResponse::Intelligent {
                sources,
                confidence,
                model,
                total_sources,
                sources_analyzed,
                ..
            } => {
                assert_eq!(confidence, 1.0);
                assert_eq!(model, "gpt-4o");
                assert_eq!(total_sources, 1);
                assert_eq!(sources_analyzed, 1);
                assert_eq!(sources[0].metadata.requirement, "Supports SMS alerts | Retail");
                assert!(!sources[0].highlight.contains("Unnamed:"));
            }
            other => panic!("expected intelligent, got {:?}", other),
        }
    }

    #[test]
    fn test_short_question_rejected() {
        let qa = QaService::new(store_with(&[]), &Config::default().retrieval);
        assert!(matches!(
            qa.ask("  hi ", &AskOptions::default()),
            Err(RfpError::Validation(_))
        ));
    }

    #[test]
    fn test_invalid_parameters_rejected() {
        let qa = QaService::new(store_with(&[]), &Config::default().retrieval);
        let bad = [
            AskOptions {
                top_n: 0,
                ..AskOptions::default()
            },
            AskOptions {
                temperature: 1.5,
                ..AskOptions::default()
            },
            AskOptions {
                max_tokens: 0,
                ..AskOptions::default()
            },
        ];
        for options in bad {
            assert!(matches!(
                qa.ask("SMS alerts", &options),
                Err(RfpError::Validation(_))
            ));
        }
    }

    #[test]
    fn test_keyword_only_service_is_last_resort() {
        let qa = QaService::new(
            store_with(&[("Core", "Supports SMS alerts")]),
            &Config::default().retrieval,
        );
        let response = qa.ask("sms alerts", &AskOptions::default()).unwrap();
        assert_eq!(response.mode(), "simple-search");
        assert_eq!(response.confidence(), 0.5);
    }

    #[test]
    fn test_keyword_fallback_honours_top_n() {
        let qa = QaService::new(
            store_with(&[
                ("Core", "Supports SMS alerts"),
                ("Cards", "Card SMS notifications"),
                ("Loans", "Loan SMS reminders"),
            ]),
            &Config::default().retrieval,
        );
        let options = AskOptions {
            top_n: 1,
            ..AskOptions::default()
        };
        match qa.ask("sms", &options).unwrap() {
            AskResponse::SimpleSearch { sources, .. } => {
                assert_eq!(sources.len(), 1);
                assert_eq!(sources[0].product, "Core");
            }
            other => panic!("expected simple-search, got {:?}", other),
        }
    }

    #[test]
    fn test_unconfigured_backend_degrades() {
        let mut provider = MockEmbeddingProvider::new();
        provider.expect_is_configured().return_const(false);
        let qa = service(
            store_with(&[("Core", "Supports SMS alerts")]),
            provider,
            chat("unused"),
        );

        let response = qa.ask("sms alerts", &AskOptions::default()).unwrap();
        assert_eq!(response.mode(), "simple-search");
        assert_eq!(response.confidence(), 0.6);
    }

    #[test]
    fn test_unavailable_mid_request_degrades() {
        let qa = service(
            store_with(&[("Core", "Supports SMS alerts")]),
            embedder(Err(EmbeddingError::Unavailable("revoked".to_string()))),
            chat("unused"),
        );
        let response = qa.ask("sms alerts", &AskOptions::default()).unwrap();
        assert_eq!(response.mode(), "simple-search");
        assert_eq!(response.confidence(), 0.6);
    }

    #[test]
    fn test_transient_failure_is_last_resort() {
        let qa = service(
            store_with(&[("Core", "Supports SMS alerts")]),
            embedder(Err(EmbeddingError::Transient("reset".to_string()))),
            chat("unused"),
        );
        let response = qa.ask("sms alerts", &AskOptions::default()).unwrap();
        assert_eq!(response.mode(), "simple-search");
        assert_eq!(response.confidence(), 0.5);
    }

    #[test]
    fn test_dimension_mismatch_is_error_mode() {
        let qa = service(
            store_with(&[("Core", "Supports SMS alerts")]),
            embedder(Ok(vec![1.0, 0.0, 0.0])),
            chat("unused"),
        );
        let response = qa.ask("sms alerts", &AskOptions::default()).unwrap();
        assert_eq!(response.mode(), "error");
        assert_eq!(response.confidence(), 0.0);
        assert!(response.answer().contains("dimension"));
    }

    #[test]
    fn test_generation_failure_keeps_sources() {
        let mut backend = MockGenerationBackend::new();
        backend.expect_is_configured().return_const(true);
        backend
            .expect_model_name()
            .return_const("gpt-4o".to_string());
        backend
            .expect_complete()
            .returning(|_| Err(GenerationError::Transient("timeout".to_string())));

        let qa = service(
            store_with(&[("Core", "Supports SMS alerts")]),
            embedder(Ok(vec![1.0, 0.0])),
            backend,
        );
        let response = qa.ask("sms alerts", &AskOptions::default()).unwrap();
        assert_eq!(response.mode(), "intelligent");
        assert_eq!(response.confidence(), 0.0);
        assert!(response.answer().starts_with("Error generating answer:"));
    }

    #[test]
    fn test_empty_corpus_no_results() {
        let qa = service(store_with(&[]), embedder(Ok(vec![1.0, 0.0])), chat("unused"));
        let response = qa.ask("sms alerts", &AskOptions::default()).unwrap();
        assert_eq!(response.mode(), "no-results");
        assert_eq!(response.confidence(), 0.0);
    }

    #[test]
    fn test_follow_up_expands_query() {
        let mut provider = MockEmbeddingProvider::new();
        provider.expect_is_configured().return_const(true);
        provider
            .expect_embed()
            .withf(|q| {
                q.starts_with("Previous Q: SMS alerts?") && q.ends_with("Current Q: And email?")
            })
            .returning(|_| Ok(vec![1.0, 0.0]));

        let qa = service(
            store_with(&[("Core", "Supports SMS alerts")]),
            provider,
            chat("Email too [Document 1]"),
        );
        let history = vec![ConversationTurn {
            question: "SMS alerts?".to_string(),
            answer: "Yes.".to_string(),
        }];
        let response = qa.follow_up("And email?", &history, None).unwrap();
        assert_eq!(response.mode(), "intelligent");
    }

    #[test]
    fn test_response_serialises_with_mode_tag() {
        let response = AskResponse::no_results("nothing");
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["mode"], "no-results");
        assert_eq!(json["confidence"], 0.0);
    }

    #[test]
    fn test_suggestions() {
        let questions = suggest_questions();
        assert_eq!(questions.len(), 10);
        assert!(questions.iter().all(|q| q.len() > 10));
    }
}
