//! Error types for the document model

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DocModelError {
    #[error("position {0} is out of range")]
    PositionOutOfRange(usize),

    #[error("position {0} is not at a node boundary")]
    NotNodeBoundary(usize),

    #[error("no node starts at position {0}")]
    NoNodeAt(usize),

    #[error("range {0}..{1} does not cover whole nodes")]
    InvalidRange(usize, usize),
}

pub type Result<T> = std::result::Result<T, DocModelError>;
