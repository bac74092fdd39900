//! rfpqa - question answering over RFP requirement sheets
//!
//! Requirement rows from RFP uploads are stored, embedded and ranked by cosine
//! similarity against a question; the top rows become numbered context for a
//! chat model. When no embedding or chat backend is usable, a deterministic
//! keyword search answers instead at lower confidence.

pub mod answer;
pub mod cli;
pub mod config;
pub mod embedding;
pub mod error;
pub mod records;
pub mod retrieval;
pub mod storage;

pub use error::{Result, RfpError};
