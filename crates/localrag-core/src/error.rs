use std::time::Duration;

use thiserror::Error;

use crate::types::{Degradation, SourceKind};

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// One retrieval source failed. Callers degrade instead of aborting.
    #[error("{engine} source unavailable: {reason}")]
    SourceUnavailable { engine: SourceKind, reason: String },

    /// The relevance model failed. Callers pass the fused order through.
    #[error("Reranker unavailable: {0}")]
    RerankerUnavailable(String),

    /// The completion collaborator failed while generating or reflecting.
    #[error("Completion failed during {stage}: {reason}")]
    Completion { stage: &'static str, reason: String },

    #[error("{stage} timed out after {after:?}")]
    Timeout { stage: &'static str, after: Duration },

    #[error("Cancelled at {stage}")]
    Cancelled { stage: &'static str },
}

impl Error {
    /// What gets recorded when this error is absorbed rather than returned.
    /// `None` for errors that always surface to the caller.
    pub fn degradation(&self) -> Option<Degradation> {
        match self {
            Error::SourceUnavailable { engine, reason } => {
                Some(Degradation::SourceUnavailable { engine: *engine, reason: reason.clone() })
            }
            Error::RerankerUnavailable(reason) => Some(Degradation::RerankerUnavailable { reason: reason.clone() }),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
