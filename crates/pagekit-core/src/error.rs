//! Error types for the parser, engine, document loading, and preview.

use crate::preview::PreviewMode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from page-specification parsing
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Input was empty or contained no tokens
    #[error("no pages specified")]
    Empty,
    /// A token was malformed or descended against policy
    #[error("invalid range: {0}")]
    InvalidRange(String),
    /// An endpoint fell outside 1..=page_count
    #[error("page {page} is out of range (1-{page_count})")]
    OutOfRange { page: u32, page_count: u32 },
}

/// Errors from plan resolution and materialization
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransformError {
    /// An op referenced a position outside the current working array.
    /// Never clamped; an index reaching the engine out of range is a
    /// contract violation by the caller.
    #[error("page index {index} is out of range (1-{len})")]
    IndexOutOfRange { index: u32, len: u32 },
    /// A reorder did not exactly cover the current working array
    #[error("reorder is not a permutation: {0}")]
    PermutationMismatch(String),
    /// The plan would produce a document with zero pages
    #[error("transformation would produce an empty document")]
    EmptyResult,
    /// Writing the output document failed
    #[error("failed to write output: {0}")]
    Materialize(String),
}

/// Errors from loading source bytes into a document handle
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    #[error("not a valid PDF: {0}")]
    Corrupt(String),
    #[error("unsupported document: {0}")]
    Unsupported(String),
    #[error("document is encrypted")]
    Encrypted,
}

/// Page render failures reported by the rasterization collaborator
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RenderError {
    #[error("page render timed out")]
    Timeout,
    #[error("page could not be rendered: {reason}")]
    Unsupported { reason: String },
}

/// Preview interaction-contract violations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PreviewError {
    #[error("operation not available in {mode} mode")]
    WrongMode { mode: PreviewMode },
    #[error("page {page} is out of range (1-{page_count})")]
    OutOfRange { page: u32, page_count: u32 },
    #[error("invalid order: {0}")]
    InvalidOrder(String),
}
