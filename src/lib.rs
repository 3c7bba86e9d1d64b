//! Drive a code-assistant CLI through an interactive shell in a PTY and
//! scrape its answer from between two shell prompts.
//!
//! ```no_run
//! use codebuff_harness::{SessionOptions, execute};
//!
//! let options = SessionOptions::new("/path/to/repo");
//! let response = execute("Fix the failing test.", &options, None);
//! println!("{}", response.output());
//! ```

pub mod buffer;
pub mod config;
pub mod error;
pub mod invocation;
pub mod prompt;
pub mod pty;
pub mod response;
pub mod session;

pub use config::HarnessConfig;
pub use error::HarnessError;
pub use response::{ErrorCode, ErrorInfo, Response};
pub use session::{SessionOptions, ShellCommand, execute};
