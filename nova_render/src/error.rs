//! Error types for the Nova render core
//!
//! This module defines the error types used throughout the crate:
//! structural frame graph errors, resource exhaustion, and backend
//! errors surfaced through the device abstraction.

use std::fmt;

/// Result type for Nova render operations
pub type Result<T> = std::result::Result<T, Error>;

/// Structural frame graph errors detected at compile time.
///
/// Every variant names the passes and attachments involved so the
/// declaration can be fixed by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameGraphError {
    /// A pass references an attachment id that was never declared
    InvalidAttachment {
        pass: String,
        attachment: usize,
    },

    /// More than one pass writes the same attachment
    AmbiguousProducer {
        attachment: String,
        passes: Vec<String>,
    },

    /// A pass reads a transient attachment that no pass writes
    MissingProducer {
        attachment: String,
        pass: String,
    },

    /// Passes form a dependency cycle (listed in cycle order)
    CyclicDependency {
        passes: Vec<String>,
    },

    /// A backbuffer output is set but no pass writes it
    BackbufferNotWritten {
        attachment: String,
    },
}

impl fmt::Display for FrameGraphError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameGraphError::InvalidAttachment { pass, attachment } => {
                write!(f, "pass '{}' references unknown attachment #{}", pass, attachment)
            }
            FrameGraphError::AmbiguousProducer { attachment, passes } => {
                write!(f, "attachment '{}' has ambiguous producer: written by passes [{}]",
                    attachment, passes.join(", "))
            }
            FrameGraphError::MissingProducer { attachment, pass } => {
                write!(f, "attachment '{}' read by pass '{}' has no producer and is not external",
                    attachment, pass)
            }
            FrameGraphError::CyclicDependency { passes } => {
                write!(f, "cyclic dependency between passes [{}]", passes.join(" -> "))
            }
            FrameGraphError::BackbufferNotWritten { attachment } => {
                write!(f, "no pass writes to backbuffer attachment '{}'", attachment)
            }
        }
    }
}

/// Nova render errors
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// Structural frame graph error (fatal for the graph instance)
    FrameGraph(FrameGraphError),

    /// A render element pool reached its configured capacity
    PoolExhausted {
        element_type: u8,
        capacity: u32,
    },

    /// Transient attachments need more memory than the configured budget
    TransientBudgetExceeded {
        required: u64,
        budget: u64,
    },

    /// Backend-specific error (Vulkan, OpenGL, etc.)
    BackendError(String),

    /// Out of GPU memory
    OutOfMemory,

    /// The device was lost; the in-flight frame cannot complete
    DeviceLost,

    /// Invalid resource (texture, attachment, handle, etc.)
    InvalidResource(String),

    /// Initialization failed (context, pipeline, passes)
    InitializationFailed(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::FrameGraph(err) => write!(f, "Frame graph error: {}", err),
            Error::PoolExhausted { element_type, capacity } => {
                write!(f, "Render element pool exhausted: type {} reached capacity {}",
                    element_type, capacity)
            }
            Error::TransientBudgetExceeded { required, budget } => {
                write!(f, "Transient memory budget exceeded: {} bytes required, {} bytes allowed",
                    required, budget)
            }
            Error::BackendError(msg) => write!(f, "Backend error: {}", msg),
            Error::OutOfMemory => write!(f, "Out of GPU memory"),
            Error::DeviceLost => write!(f, "Device lost"),
            Error::InvalidResource(msg) => write!(f, "Invalid resource: {}", msg),
            Error::InitializationFailed(msg) => write!(f, "Initialization failed: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

impl From<FrameGraphError> for Error {
    fn from(err: FrameGraphError) -> Self {
        Error::FrameGraph(err)
    }
}

/// Log an error and return `Err(Error::BackendError(..))` from the current function.
///
/// # Example
///
/// ```ignore
/// engine_bail!("nova::Viewer", "Viewer '{}' already exists", name);
/// ```
#[macro_export]
macro_rules! engine_bail {
    ($source:expr, $($arg:tt)*) => {
        return Err($crate::engine_err!($source, $($arg)*))
    };
}

/// Log an error and build an `Error::BackendError(..)` without returning.
#[macro_export]
macro_rules! engine_err {
    ($source:expr, $($arg:tt)*) => {{
        let message = format!($($arg)*);
        $crate::engine_error!($source, "{}", message);
        $crate::nova::Error::BackendError(message)
    }};
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
