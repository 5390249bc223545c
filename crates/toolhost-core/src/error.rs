use std::path::PathBuf;

/// Terminal failures of a single runtime invocation.
///
/// Per-tool discovery failures are not represented here: they are recorded as
/// data on the descriptor (see [`crate::registry::Extraction::Failed`]).
#[derive(Debug, thiserror::Error)]
pub enum ToolhostError {
    /// The tool is unknown, or its descriptor could not be extracted.
    #[error("tool '{0}' not found or could not be loaded")]
    NotFound(String),

    /// Sandbox creation or dependency installation failed. No process was started.
    #[error("failed to provision sandbox for '{name}': {message}")]
    Provision { name: String, message: String },

    /// The tool process ran and exited unsuccessfully.
    #[error("tool '{name}' failed{}: {stderr}", .code.map(|c| format!(" with exit code {c}")).unwrap_or_default())]
    Execution {
        name: String,
        code: Option<i32>,
        stderr: String,
    },

    /// The interpreter selected for the tool does not exist.
    #[error("runtime executable not found for '{name}': {}", .interpreter.display())]
    RuntimeNotFound { name: String, interpreter: PathBuf },

    /// Caller-supplied payload is not valid JSON.
    #[error("invalid input payload: {0}")]
    Input(String),

    #[error("invalid configuration at {}: {message}", .path.display())]
    Config { path: PathBuf, message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T, E = ToolhostError> = std::result::Result<T, E>;
