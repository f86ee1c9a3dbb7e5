//! Error types shared by every stage of the walk.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WalkError {
    /// A tree-representation line that is not comma separated integers plus a score slot.
    #[error("{}:{line_number}: malformed line ({reason}): {line:?}", path.display())]
    MalformedLine {
        path: PathBuf,
        line_number: usize,
        line: String,
        reason: String,
    },

    /// Contradictory or incomplete options, raised before any work starts.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The parsimony scorer failed or produced unusable output.
    #[error("{tool} failed: {message}")]
    ExternalTool { tool: String, message: String },

    #[error("{}: malformed alignment: {reason}", path.display())]
    MalformedAlignment { path: PathBuf, reason: String },

    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl WalkError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        WalkError::Io { path: path.into(), source }
    }

    pub(crate) fn tool(tool: impl Into<String>, message: impl Into<String>) -> Self {
        WalkError::ExternalTool { tool: tool.into(), message: message.into() }
    }
}

pub type Result<T> = std::result::Result<T, WalkError>;
