//! Result of one harness invocation.

use serde::ser::{Serialize, SerializeStruct, Serializer};
use serde_json::Value;

/// Failure classification reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    Timeout,
    PtyError,
    NoOutput,
    ExecutionError,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Timeout => "TIMEOUT",
            Self::PtyError => "PTY_ERROR",
            Self::NoOutput => "NO_OUTPUT",
            Self::ExecutionError => "EXECUTION_ERROR",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ErrorInfo {
    pub message: String,
    pub code: ErrorCode,
    /// Structured description of the underlying fault, when there is one.
    pub details: Option<Value>,
}

/// Outcome of [`crate::execute`]. Built once per invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    /// Text captured between the two prompt markers.
    Success { output: String },
    /// Whatever output had accumulated when the run failed.
    Failure { output: String, error: ErrorInfo },
}

impl Response {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn output(&self) -> &str {
        match self {
            Self::Success { output } | Self::Failure { output, .. } => output,
        }
    }

    pub fn error(&self) -> Option<&ErrorInfo> {
        match self {
            Self::Success { .. } => None,
            Self::Failure { error, .. } => Some(error),
        }
    }

    pub fn code(&self) -> Option<ErrorCode> {
        self.error().map(|e| e.code)
    }
}

// Flat wire shape: { success, output, error }.
impl Serialize for Response {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Response", 3)?;
        state.serialize_field("success", &self.is_success())?;
        state.serialize_field("output", self.output())?;
        state.serialize_field("error", &self.error())?;
        state.end()
    }
}
