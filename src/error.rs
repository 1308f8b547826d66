use std::fmt::{Display, Formatter};
use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, SortError>;

/// The phase of a run in which a failure happened.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Split,
    Sort,
    Merge,
}

impl Display for Phase {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Split => write!(f, "split"),
            Phase::Sort => write!(f, "sort"),
            Phase::Merge => write!(f, "merge"),
        }
    }
}

/// Errors surfaced by a sort run. None of them is retried.
#[derive(Debug, Error)]
pub enum SortError {
    /// The input file is missing or cannot be read. Nothing has been written yet when the
    /// file cannot be opened.
    #[error("source unreadable: {path}: {source}")]
    SourceUnreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A chunk could not be written during split or while being rewritten after sort.
    /// Chunks already on disk are left in place.
    #[error("{phase} phase failed to write chunk {path}: {source}")]
    ChunkWriteFailure {
        phase: Phase,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A chunk could not be loaded for sorting.
    #[error("sort phase failed to read chunk {path}: {source}")]
    ChunkReadFailure {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A row does not have the fields the sort key or its chunk's schema requires.
    #[error("malformed row at {location}: expected {expected} fields, found {found}")]
    ComparisonArityMismatch {
        location: String,
        expected: usize,
        found: usize,
    },

    /// Opening or reading a chunk, or writing the output, failed while merging.
    #[error("merge phase failed on {path}: {source}")]
    MergeIoFailure {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("worker pool: {0}")]
    WorkerPool(String),

    /// A sort task panicked. The chunk is reported as failed instead of being dropped.
    #[error("sort task panicked on chunk {path}")]
    TaskPanicked { path: PathBuf },
}

impl SortError {
    /// The phase the error belongs to, when it is tied to one.
    pub fn phase(&self) -> Option<Phase> {
        match self {
            SortError::SourceUnreadable { .. } => Some(Phase::Split),
            SortError::ChunkWriteFailure { phase, .. } => Some(*phase),
            SortError::ChunkReadFailure { .. } => Some(Phase::Sort),
            SortError::TaskPanicked { .. } => Some(Phase::Sort),
            SortError::WorkerPool(_) => Some(Phase::Sort),
            SortError::MergeIoFailure { .. } => Some(Phase::Merge),
            SortError::ComparisonArityMismatch { .. } => None,
            SortError::InvalidConfig(_) => None,
        }
    }
}
