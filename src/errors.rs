// SPDX-License-Identifier: GPL-3.0-only

//! Error types for the capture pipeline

use crate::backends::camera::{PixelEncoding, SourceError};
use std::fmt;

/// Result type alias using PipelineError
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Result type alias using ConvertError
pub type ConvertResult<T> = Result<T, ConvertError>;

/// Errors surfaced by the pipeline controller.
///
/// Only startup-class failures reach callers this way; faults during a run
/// are recovered in place and reported through the monitor.
#[derive(Debug, Clone)]
pub enum PipelineError {
    /// The capture source refused a session or configuration call
    Source(SourceError),
    /// The output sink could not be opened or written
    Sink(String),
    /// `start` called while a capture run is active
    AlreadyRunning,
    /// `stop` called with no capture run active
    NotRunning,
    /// Configuration could not be loaded or stored
    Config(String),
}

/// Errors from the raw-to-sample conversion routines
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConvertError {
    /// The converter has no routine for this sample layout
    UnsupportedEncoding(PixelEncoding),
    /// The raw buffer is shorter than its declared geometry requires
    ShortBuffer { expected: usize, actual: usize },
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::Source(e) => write!(f, "Capture source error: {}", e),
            PipelineError::Sink(msg) => write!(f, "Output sink error: {}", msg),
            PipelineError::AlreadyRunning => write!(f, "Pipeline is already running"),
            PipelineError::NotRunning => write!(f, "Pipeline is not running"),
            PipelineError::Config(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl fmt::Display for ConvertError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConvertError::UnsupportedEncoding(encoding) => {
                write!(f, "No conversion routine for {}", encoding)
            }
            ConvertError::ShortBuffer { expected, actual } => {
                write!(f, "Raw buffer too short: need {} bytes, got {}", expected, actual)
            }
        }
    }
}

impl std::error::Error for PipelineError {}
impl std::error::Error for ConvertError {}

impl From<SourceError> for PipelineError {
    fn from(err: SourceError) -> Self {
        PipelineError::Source(err)
    }
}

impl From<std::io::Error> for PipelineError {
    fn from(err: std::io::Error) -> Self {
        PipelineError::Sink(err.to_string())
    }
}
