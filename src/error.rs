//! Internal failure taxonomy for a harness run.
//!
//! Every variant maps onto one of the four public [`ErrorCode`]s and knows how
//! much of the accumulated output should travel with it. The runner converts
//! these into [`ErrorInfo`] at the boundary so nothing escapes `execute`.

use std::io;
use std::path::PathBuf;
use std::str::Utf8Error;

use serde_json::{Value, json};
use thiserror::Error;

use crate::response::{ErrorCode, ErrorInfo};

#[derive(Debug, Error)]
pub enum HarnessError {
    /// The wall-clock deadline passed before two prompts were seen.
    #[error("Timeout after {secs} seconds")]
    Timeout { secs: u64 },

    /// The child exited before a complete response was framed by prompts.
    #[error("Process completed with no output")]
    NoOutput,

    /// The pty transport failed while reading.
    #[error("{0}")]
    PtyRead(#[source] io::Error),

    #[error("timeout must be a positive number of seconds")]
    InvalidTimeout,

    #[error("failed to write instructions to {}", path.display())]
    WriteInstructions {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to open PTY")]
    OpenPty(#[source] anyhow::Error),

    #[error("failed to spawn shell '{shell}'")]
    Spawn {
        shell: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to attach to PTY master")]
    Attach(#[source] anyhow::Error),

    #[error("failed to start PTY reader thread")]
    Reader(#[source] io::Error),

    #[error("failed to send command to shell")]
    Inject(#[source] io::Error),

    #[error("PTY output is not valid UTF-8")]
    Decode(#[source] Utf8Error),
}

impl HarnessError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Timeout { .. } => ErrorCode::Timeout,
            Self::NoOutput => ErrorCode::NoOutput,
            Self::PtyRead(_) => ErrorCode::PtyError,
            _ => ErrorCode::ExecutionError,
        }
    }

    /// The slice of accumulated output reported alongside this failure.
    pub fn partial_output(&self, accumulated: &str) -> String {
        match self {
            Self::NoOutput => String::new(),
            Self::PtyRead(_) => accumulated.to_string(),
            _ => accumulated.trim().to_string(),
        }
    }

    fn message(&self) -> String {
        match self {
            Self::Timeout { .. } | Self::NoOutput | Self::PtyRead(_) => self.to_string(),
            Self::Spawn { shell, source } if is_not_found(source) => format!(
                "Could not find the '{shell}' shell. Please ensure it is installed and in your system PATH."
            ),
            _ => error_chain(self).join(": "),
        }
    }

    fn details(&self) -> Option<Value> {
        match self {
            Self::Timeout { .. } | Self::NoOutput => None,
            Self::PtyRead(err) => Some(json!({
                "kind": format!("{:?}", err.kind()),
                "os_error": err.raw_os_error(),
                "message": err.to_string(),
            })),
            _ => Some(json!({
                "kind": self.kind(),
                "chain": error_chain(self),
            })),
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::Timeout { .. } => "timeout",
            Self::NoOutput => "no_output",
            Self::PtyRead(_) => "pty_read",
            Self::InvalidTimeout => "invalid_timeout",
            Self::WriteInstructions { .. } => "write_instructions",
            Self::OpenPty(_) => "open_pty",
            Self::Spawn { .. } => "spawn",
            Self::Attach(_) => "attach",
            Self::Reader(_) => "reader",
            Self::Inject(_) => "inject",
            Self::Decode(_) => "decode",
        }
    }
}

impl From<&HarnessError> for ErrorInfo {
    fn from(err: &HarnessError) -> Self {
        ErrorInfo {
            message: err.message(),
            code: err.code(),
            details: err.details(),
        }
    }
}

fn error_chain(err: &(dyn std::error::Error + 'static)) -> Vec<String> {
    let mut chain = vec![err.to_string()];
    let mut source = err.source();
    while let Some(cause) = source {
        chain.push(cause.to_string());
        source = cause.source();
    }
    chain
}

fn is_not_found(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        cause
            .downcast_ref::<io::Error>()
            .is_some_and(|e| e.kind() == io::ErrorKind::NotFound)
            || cause.to_string().contains("not found in PATH")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_follow_taxonomy() {
        assert_eq!(HarnessError::Timeout { secs: 1 }.code(), ErrorCode::Timeout);
        assert_eq!(HarnessError::NoOutput.code(), ErrorCode::NoOutput);
        assert_eq!(
            HarnessError::PtyRead(io::Error::other("boom")).code(),
            ErrorCode::PtyError
        );
        assert_eq!(
            HarnessError::InvalidTimeout.code(),
            ErrorCode::ExecutionError
        );
        assert_eq!(
            HarnessError::Inject(io::Error::other("closed")).code(),
            ErrorCode::ExecutionError
        );
    }

    #[test]
    fn partial_output_policy() {
        let raw = "  > \nhello\n";
        assert_eq!(HarnessError::Timeout { secs: 1 }.partial_output(raw), "> \nhello");
        assert_eq!(HarnessError::NoOutput.partial_output(raw), "");
        assert_eq!(
            HarnessError::PtyRead(io::Error::other("x")).partial_output(raw),
            raw
        );
        assert_eq!(HarnessError::InvalidTimeout.partial_output(raw), "> \nhello");
    }

    #[test]
    fn timeout_info_has_no_details() {
        let info = ErrorInfo::from(&HarnessError::Timeout { secs: 60 });
        assert_eq!(info.message, "Timeout after 60 seconds");
        assert_eq!(info.code, ErrorCode::Timeout);
        assert!(info.details.is_none());
    }

    #[test]
    fn execution_error_message_includes_source() {
        let err = HarnessError::WriteInstructions {
            path: PathBuf::from("/nope/instructions.md"),
            source: io::Error::new(io::ErrorKind::NotFound, "No such file or directory"),
        };
        let info = ErrorInfo::from(&err);
        assert_eq!(info.code, ErrorCode::ExecutionError);
        assert!(info.message.contains("/nope/instructions.md"));
        assert!(info.message.contains("No such file or directory"));
        let details = info.details.unwrap();
        assert_eq!(details["kind"], "write_instructions");
        assert_eq!(details["chain"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn missing_shell_gets_a_hint() {
        let err = HarnessError::Spawn {
            shell: "no-such-shell".to_string(),
            source: anyhow::Error::new(io::Error::new(io::ErrorKind::NotFound, "missing")),
        };
        let info = ErrorInfo::from(&err);
        assert!(info.message.contains("Could not find the 'no-such-shell' shell"));
    }

    #[test]
    fn pty_error_details_carry_raw_error() {
        let err = HarnessError::PtyRead(io::Error::new(io::ErrorKind::BrokenPipe, "pipe"));
        let info = ErrorInfo::from(&err);
        assert_eq!(info.message, "pipe");
        let details = info.details.unwrap();
        assert_eq!(details["kind"], "BrokenPipe");
        assert_eq!(details["message"], "pipe");
    }
}
