//! Error types for the Aurora engine
//!
//! This module defines the error types used throughout the engine,
//! including device construction, GPU resource creation and resource decoding.

use std::fmt;
use std::path::PathBuf;

/// Result type for Aurora engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Aurora engine errors
#[derive(Debug, Clone)]
pub enum Error {
    /// Backend-specific error (Vulkan, mock, etc.)
    BackendError(String),

    /// Out of GPU memory (or no memory type satisfies the request)
    OutOfMemory,

    /// Invalid resource (buffer, image, pipeline, cache handle, etc.)
    InvalidResource(String),

    /// Initialization failed (device, swapchain, allocator, frame orchestrator)
    InitializationFailed(String),

    /// Shader source could not be read or compiled
    ShaderCompilation {
        path: PathBuf,
        message: String,
    },

    /// Texture file could not be read, decoded or validated
    TextureDecode {
        path: PathBuf,
        message: String,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::BackendError(msg) => write!(f, "Backend error: {}", msg),
            Error::OutOfMemory => write!(f, "Out of GPU memory"),
            Error::InvalidResource(msg) => write!(f, "Invalid resource: {}", msg),
            Error::InitializationFailed(msg) => write!(f, "Initialization failed: {}", msg),
            Error::ShaderCompilation { path, message } => {
                write!(f, "Shader compilation failed for '{}': {}", path.display(), message)
            }
            Error::TextureDecode { path, message } => {
                write!(f, "Texture decode failed for '{}': {}", path.display(), message)
            }
        }
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
