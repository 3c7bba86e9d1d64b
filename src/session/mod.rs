//! Session runner: one assistant invocation inside a fresh shell.
//!
//! ```text
//! INIT -> SPAWNED -> [READING <-> WAITING_FOR_DATA]
//!      -> {SUCCESS | TIMEOUT | PTY_ERROR | NO_OUTPUT | EXECUTION_ERROR}
//!      -> TERMINATED
//! ```
//!
//! The instructions file is written before the shell starts. The shell gets a
//! single command line, then the loop reads output until the prompt scanner
//! frames a response, the child exits, or the deadline passes. The child is
//! dead before `execute` returns on every path.

mod options;

pub use options::{DEFAULT_SHELL, DEFAULT_TIMEOUT_SECS, SessionOptions, ShellCommand};

use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::buffer::OutputBuffer;
use crate::error::HarnessError;
use crate::invocation::{DEFAULT_PROMPT, INSTRUCTIONS_FILE, invocation_line};
use crate::prompt::{PromptScanner, ScanState};
use crate::pty::{Poll, PtyProcess, SpawnSpec};
use crate::response::{ErrorInfo, Response};

/// Upper bound on a single wait for output.
const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Run the assistant once and scrape its answer.
///
/// `prompt` defaults to asking the assistant to solve `instructions.md`.
/// Never fails: problems come back as [`Response::Failure`] with whatever
/// output had accumulated.
pub fn execute(instructions: &str, options: &SessionOptions, prompt: Option<&str>) -> Response {
    let mut buffer = OutputBuffer::new();
    let result = run(instructions, options, prompt.unwrap_or(DEFAULT_PROMPT), &mut buffer);

    match result {
        Ok(output) => {
            info!(bytes = output.len(), "captured response");
            Response::Success { output }
        }
        Err(err) => {
            let error = ErrorInfo::from(&err);
            warn!(code = %error.code, "run failed: {}", error.message);
            if options.debug {
                eprintln!("[codebuff-harness] error executing codebuff: {}", error.message);
            }
            Response::Failure {
                output: err.partial_output(buffer.text()),
                error,
            }
        }
    }
}

fn run(
    instructions: &str,
    options: &SessionOptions,
    prompt: &str,
    buffer: &mut OutputBuffer,
) -> Result<String, HarnessError> {
    let timeout = options.timeout()?;
    write_instructions(&options.cwd, instructions)?;

    let spec = SpawnSpec {
        program: options.shell.program.clone(),
        args: options.shell.args.clone(),
        cwd: options.cwd.clone(),
        env: options.child_env(),
        size: options.pty_size,
    };
    // Dropping `child` on any return below terminates it.
    let mut child = PtyProcess::spawn(&spec)?;
    if options.debug {
        eprintln!("[codebuff-harness] starting codebuff in {}", options.cwd.display());
    }

    child.send(&invocation_line(&options.program, prompt))?;

    let started = Instant::now();
    let mut scanner = PromptScanner::new();

    loop {
        let elapsed = started.elapsed();
        if elapsed > timeout {
            if options.debug {
                eprintln!("[codebuff-harness] timeout after {} seconds", options.timeout_secs);
            }
            child.kill();
            return Err(HarnessError::Timeout {
                secs: options.timeout_secs,
            });
        }

        if !child.is_alive() {
            break;
        }

        let wait = POLL_INTERVAL.min(timeout.saturating_sub(elapsed));
        let chunk = match child.poll(wait) {
            Poll::Data(chunk) => chunk,
            Poll::Idle => {
                thread::yield_now();
                continue;
            }
            Poll::Failed(e) => return Err(HarnessError::PtyRead(e)),
        };
        if chunk.is_empty() {
            continue;
        }

        let decoded = buffer.push(&chunk).map_err(HarnessError::Decode)?;
        if options.debug {
            eprintln!("[codebuff-harness] raw output: {decoded:?}");
        }

        let before = scanner.state();
        let captured = scanner.scan(buffer.text());
        if options.debug && before == ScanState::AwaitingFirstPrompt && before != scanner.state() {
            eprintln!("[codebuff-harness] found first prompt");
        }
        if let Some(output) = captured {
            if options.debug {
                eprintln!("[codebuff-harness] found second prompt");
            }
            return Ok(output);
        }
        thread::yield_now();
    }

    debug!(bytes = buffer.len(), "child exited before a complete response");
    Err(HarnessError::NoOutput)
}

fn write_instructions(cwd: &Path, instructions: &str) -> Result<(), HarnessError> {
    let path = cwd.join(INSTRUCTIONS_FILE);
    std::fs::write(&path, instructions)
        .map_err(|source| HarnessError::WriteInstructions { path: path.clone(), source })?;
    debug!(path = %path.display(), bytes = instructions.len(), "wrote instructions");
    Ok(())
}
