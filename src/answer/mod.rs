//! Answer side of the pipeline
//!
//! - `ContextComposer`: ranked results → numbered context blocks
//! - `AnswerGenerator`: context + question → answer and confidence
//! - `OpenAiChat` / `DisabledChat`: generation backends
//! - `build_follow_up`: folds conversation history into the query
//! - `QaService`: `ask` / `follow_up` with keyword fallback

mod composer;
mod conversation;
mod generator;
mod openai;
mod service;

pub use composer::ContextComposer;
pub use conversation::{build_follow_up, ConversationTurn};
#[cfg(test)]
pub use generator::MockGenerationBackend;
pub use generator::{
    answer_confidence, AnswerGenerator, Completion, CompletionRequest, FinishReason,
    GeneratedAnswer, GenerationBackend, GenerationError, GenerationState,
};
pub use openai::{build_backend, DisabledChat, OpenAiChat};
pub use service::{suggest_questions, AskOptions, AskResponse, IntelligentPipeline, QaService};
