use std::{io, path::PathBuf, process::ExitStatus};

use thiserror::Error;

use crate::util::ReturnCode;

/// Failures reported to the user. Compiler-internal inconsistencies are not
/// represented here; those panic at the site that detects them.
#[derive(Debug, Error)]
pub enum CodegenError {
    #[error("unable to read {path}: {source}")]
    Input {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed class hierarchy in {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("could not open {path} for writing: {source}")]
    Output {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to spawn {tool}: {source}")]
    ToolMissing {
        tool: String,
        #[source]
        source: io::Error,
    },

    #[error("{tool} exited with {status}")]
    ToolFailed { tool: String, status: ExitStatus },

    #[error("no usable target: {0}")]
    Target(String),
}

impl CodegenError {
    pub fn return_code(&self) -> ReturnCode {
        match self {
            CodegenError::Input { .. } | CodegenError::Decode { .. } => ReturnCode::InputError,
            CodegenError::Output { .. }
            | CodegenError::ToolMissing { .. }
            | CodegenError::ToolFailed { .. }
            | CodegenError::Target(..) => ReturnCode::ToolchainError,
        }
    }
}

pub type Result<T> = std::result::Result<T, CodegenError>;
