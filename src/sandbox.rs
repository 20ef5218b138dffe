mod errors;
mod governor;
mod pipeline;
mod supervisor;
mod workspace;

pub use errors::{ClientError, RunError};
pub use governor::{CappedStreams, TRUNCATION_MARKER, cap_output};
pub use pipeline::{execute, run_plan};
pub use supervisor::{StageCommand, run_stage};
pub use workspace::Workspace;

use serde::{Deserialize, Serialize};

/// Exit code reported for a stage the supervisor had to kill
pub const TIMEOUT_EXIT_CODE: i32 = -1;

/// A submitted snippet, as received from the caller
#[derive(Deserialize, Debug, Clone, Default)]
pub struct ExecutionRequest {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub stdin: Option<String>,
}

/// Result of one supervised process (compile or run)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageResult {
    pub exit_code: i32,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub timed_out: bool,
    /// Supervisor message for stderr, appended after the output cap
    pub notice: Option<String>,
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    #[serde(rename = "Success")]
    Success,
    #[serde(rename = "Compilation Error")]
    CompilationError,
    #[serde(rename = "Runtime Error")]
    RuntimeError,
    #[serde(rename = "Timeout Error")]
    TimeoutError,
    #[serde(rename = "Server Error")]
    ServerError,
}

/// What the caller gets back for a finished execution
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct ExecutionOutcome {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    pub status: Status,
}
