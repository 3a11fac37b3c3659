//! Error types for the packed table engine

use thiserror::Error;

pub type Result<T> = std::result::Result<T, TableError>;

#[derive(Error, Debug)]
pub enum TableError {
    #[error("ID {id} is not valid for table with count {count}")]
    InvalidId { id: String, count: usize },

    #[error("Cannot add unsorted and/or duplicate relations: data[{index}] = {previous}; data[{next}] = {current}", next = .index + 1)]
    UnsortedOrDuplicateRelation {
        index: usize,
        previous: u32,
        current: u32,
    },

    #[error("Out of order append: expected id {expected}, got {actual}")]
    OutOfOrderAppend { expected: u32, actual: u32 },

    #[error("Index {index} out of range for length {len}")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Capacity {0} must be > 0")]
    InvalidCapacity(usize),

    #[error("Format mismatch: {0}")]
    FormatMismatch(String),

    #[error("String contains a line break and cannot be stored: {0:?}")]
    LineBreakInString(String),

    #[error("Relation tables have not been constructed")]
    RelationsNotConstructed,

    #[error("Invert invariant violated: position {position} exceeds count {count} for id {id}")]
    InvertInvariant { id: u32, position: u32, count: u32 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl TableError {
    /// Stable error code, for callers that surface errors to users.
    pub fn code(&self) -> &'static str {
        match self {
            TableError::InvalidId { .. } => "INVALID_ID",
            TableError::UnsortedOrDuplicateRelation { .. } => "UNSORTED_OR_DUPLICATE_RELATION",
            TableError::OutOfOrderAppend { .. } => "OUT_OF_ORDER_APPEND",
            TableError::IndexOutOfRange { .. } | TableError::InvalidCapacity(_) => {
                "CAPACITY_OR_INDEX_VIOLATION"
            }
            TableError::FormatMismatch(_) => "FORMAT_MISMATCH",
            TableError::LineBreakInString(_) => "LINE_BREAK_IN_STRING",
            TableError::RelationsNotConstructed => "RELATIONS_NOT_CONSTRUCTED",
            TableError::InvertInvariant { .. } => "INTERNAL_ERROR",
            TableError::Io(_) | TableError::Json(_) => "IO_ERROR",
        }
    }
}
