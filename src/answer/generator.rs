//! Grounded answer generation over composed context

use crate::retrieval::RetrievalError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

const CITATION_MARKER: &str = "[Document ";

const SYSTEM_PROMPT: &str = "You are an analyst helping a vendor team answer banking RFPs. \
The user message contains a question and an \"RFP Context\" section made of numbered \
source blocks.

Rules:
1. Read every source block before answering.
2. Answer only from the RFP Context. Do not add requirements that are not in it.
3. Cite the blocks you use by number, for example [Document 2].
4. When several blocks cover the topic, combine them and cite each one.
5. If the context is non-empty, never reply that no information was found; report \
what the blocks do say, including gaps or open points they mention.
6. Prefer short paragraphs and bullet lists. Keep a professional tone.";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GenerationError {
    /// No credentials or backend disabled; permanent for the process lifetime
    #[error("Generation backend unavailable: {0}")]
    Unavailable(String),

    #[error("Generation request failed: {0}")]
    Transient(String),

    #[error("Malformed generation response: {0}")]
    Malformed(String),
}

/// Why the backend stopped producing tokens
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FinishReason {
    Stop,
    Length,
    Other(String),
}

impl FinishReason {
    pub fn parse(reason: &str) -> Self {
        match reason {
            "stop" => Self::Stop,
            "length" => Self::Length,
            other => Self::Other(other.to_string()),
        }
    }

    fn base_confidence(&self) -> f32 {
        match self {
            Self::Stop => 0.95,
            Self::Length => 0.85,
            Self::Other(_) => 0.75,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub system_prompt: String,
    pub user_prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub text: String,
    pub finish_reason: FinishReason,
}

/// A chat-completion style backend: one blocking request, no retries
#[cfg_attr(test, mockall::automock)]
pub trait GenerationBackend: Send + Sync {
    fn complete(&self, request: &CompletionRequest) -> Result<Completion, GenerationError>;

    fn model_name(&self) -> &str;

    fn is_configured(&self) -> bool;
}

/// Lifecycle of one generation request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationState {
    NotStarted,
    ContextPrepared,
    AnswerRequested,
    Answered,
    Errored,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedAnswer {
    pub answer: String,
    pub confidence: f32,
    pub state: GenerationState,
}

/// Confidence from the finish signal, plus 0.05 when the answer cites a block
pub fn answer_confidence(finish_reason: &FinishReason, answer: &str) -> f32 {
    let base = finish_reason.base_confidence();
    if answer.contains(CITATION_MARKER) {
        (base + 0.05).min(1.0)
    } else {
        base
    }
}

pub struct AnswerGenerator {
    backend: Arc<dyn GenerationBackend>,
}

impl AnswerGenerator {
    pub fn new(backend: Arc<dyn GenerationBackend>) -> Self {
        Self { backend }
    }

    pub fn is_configured(&self) -> bool {
        self.backend.is_configured()
    }

    pub fn model_name(&self) -> &str {
        self.backend.model_name()
    }

    /// Generate an answer for `question` grounded in `context`
    ///
    /// Backend failures are folded into the answer text with confidence 0.0.
    /// Only an unconfigured backend is returned as an error, so the caller can
    /// switch to keyword search.
    pub fn generate(
        &self,
        question: &str,
        context: &str,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<GeneratedAnswer, RetrievalError> {
        let mut state = GenerationState::NotStarted;

        let request = CompletionRequest {
            system_prompt: SYSTEM_PROMPT.to_string(),
            user_prompt: format!(
                "Question: {}\n\nRFP Context:\n{}\n\nAnswer the question from the RFP requirements above.",
                question, context
            ),
            temperature,
            max_tokens,
        };
        transition(&mut state, GenerationState::ContextPrepared);

        transition(&mut state, GenerationState::AnswerRequested);
        match self.backend.complete(&request) {
            Ok(completion) => {
                transition(&mut state, GenerationState::Answered);
                let confidence = answer_confidence(&completion.finish_reason, &completion.text);
                Ok(GeneratedAnswer {
                    answer: completion.text,
                    confidence,
                    state,
                })
            }
            Err(GenerationError::Unavailable(msg)) => {
                transition(&mut state, GenerationState::Errored);
                Err(RetrievalError::Unavailable(msg))
            }
            Err(e) => {
                transition(&mut state, GenerationState::Errored);
                tracing::warn!("Answer generation failed: {}", e);
                Ok(GeneratedAnswer {
                    answer: format!("Error generating answer: {}", e),
                    confidence: 0.0,
                    state,
                })
            }
        }
    }
}

fn transition(state: &mut GenerationState, next: GenerationState) {
    tracing::debug!("Generation {:?} -> {:?}", state, next);
    *state = next;
}
