// In: src/error.rs

//! This module defines the single, unified error type for the entire chromapack library.
//! It uses the `thiserror` crate to provide ergonomic, context-aware error handling.

use std::fmt;

use thiserror::Error;

/// The pipeline stage an error surfaced in. Reported to the user alongside the
/// offending chunk or frame index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Encode,
    Decode,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Encode => f.write_str("encode"),
            Stage::Decode => f.write_str("decode"),
        }
    }
}

#[derive(Error, Debug)]
pub enum ChromaError {
    // =========================================================================
    // === Stream & Protocol Errors
    // =========================================================================
    /// A marker or state-machine violation in a decoded symbol stream.
    #[error("Malformed stream at symbol offset {offset}: {reason}")]
    MalformedStream { offset: u64, reason: String },

    /// A color with no exact palette entry. Only raised by exact lookups; the
    /// nearest-match path treats this as a soft, logged condition.
    #[error("Color ({r}, {g}, {b}) is not a palette color")]
    UnknownColor { r: u8, g: u8, b: u8 },

    /// Append past the end of a frame. Callers must drain first.
    #[error("Frame buffer is full (capacity {capacity})")]
    FrameFull { capacity: usize },

    // =========================================================================
    // === Scheduling Errors
    // =========================================================================
    #[error("Worker pool is closed and no longer accepts tasks")]
    PoolClosed,

    /// A task returned an error (kept as `source`) or panicked (message only).
    #[error("Task {key} failed: {message}")]
    TaskFailed {
        key: u64,
        message: String,
        #[source]
        source: Option<Box<ChromaError>>,
    },

    #[error(
        "{stage} pipeline failed{}{}: {source}",
        index_suffix(.index),
        partial_suffix(.partial_output)
    )]
    PipelineError {
        stage: Stage,
        index: Option<u64>,
        partial_output: bool,
        #[source]
        source: Box<ChromaError>,
    },

    // =========================================================================
    // === Collaborator & Configuration Errors
    // =========================================================================
    /// A failure of an external read/write collaborator (rasterizer, writer, source).
    #[error("Source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Internal logic error (this is a bug): {0}")]
    InternalError(String),

    // =========================================================================
    // === External Error Wrappers (Using #[from] for automatic conversion)
    // =========================================================================
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An error from the Serde JSON library, typically while loading a config file.
    #[error("Serde JSON error: {0}")]
    SerdeJson(#[from] serde_json::Error),
}

impl ChromaError {
    pub(crate) fn malformed(offset: u64, reason: impl Into<String>) -> Self {
        ChromaError::MalformedStream {
            offset,
            reason: reason.into(),
        }
    }

    /// Wraps an error with pipeline context. Already-wrapped errors are left alone
    /// so the innermost stage and index win.
    pub(crate) fn in_pipeline(self, stage: Stage, index: Option<u64>, partial_output: bool) -> Self {
        match self {
            err @ ChromaError::PipelineError { .. } => err,
            // A failed task's own error is what the caller needs to see.
            ChromaError::TaskFailed {
                key,
                source: Some(source),
                ..
            } => (*source).in_pipeline(stage, index.or(Some(key)), partial_output),
            other => {
                let index = index.or(match &other {
                    ChromaError::TaskFailed { key, .. } => Some(*key),
                    _ => None,
                });
                ChromaError::PipelineError {
                    stage,
                    index,
                    partial_output,
                    source: Box::new(other),
                }
            }
        }
    }
}

fn index_suffix(index: &Option<u64>) -> String {
    index.map(|i| format!(" at index {}", i)).unwrap_or_default()
}

fn partial_suffix(partial_output: &bool) -> &'static str {
    if *partial_output {
        " (partial output was already written)"
    } else {
        ""
    }
}

// =============================================================================
// === Manual `From` Implementations ===
// =============================================================================

impl From<png::EncodingError> for ChromaError {
    fn from(err: png::EncodingError) -> Self {
        ChromaError::SourceUnavailable(format!("PNG encoding failed: {}", err))
    }
}

impl From<png::DecodingError> for ChromaError {
    fn from(err: png::DecodingError) -> Self {
        ChromaError::SourceUnavailable(format!("PNG decoding failed: {}", err))
    }
}
