//! Child process attached to a pseudo-terminal.
//!
//! The shell is spawned on the slave side; we keep the master. A reader
//! thread drains the master into a bounded channel so the control loop can
//! wait on output with a deadline. Dropping a [`PtyProcess`] always leaves the
//! child dead and reaped.

use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender};
use std::thread;
use std::time::{Duration, Instant};

use portable_pty::{Child, ChildKiller, CommandBuilder, MasterPty, PtySize, native_pty_system};
use tracing::{debug, info, trace, warn};

use crate::error::HarnessError;

const READ_CHUNK: usize = 4096;
const CHANNEL_DEPTH: usize = 64;
/// How long to keep polling for the exit status after a kill.
const REAP_TIMEOUT: Duration = Duration::from_secs(2);
const REAP_INTERVAL: Duration = Duration::from_millis(10);
/// Sleep used in place of a channel wait once the reader has finished.
const CLOSED_BACKOFF: Duration = Duration::from_millis(20);

/// Everything needed to launch the child.
#[derive(Debug, Clone)]
pub struct SpawnSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    /// Added on top of the inherited environment, for the child only.
    pub env: Vec<(String, String)>,
    pub size: PtySize,
}

enum ReaderEvent {
    Data(Vec<u8>),
    Closed,
    Failed(io::Error),
}

/// Result of one bounded wait on the child's output.
#[derive(Debug)]
pub enum Poll {
    Data(Vec<u8>),
    /// Nothing arrived before the wait elapsed (or the stream has ended).
    Idle,
    Failed(io::Error),
}

pub struct PtyProcess {
    child: Box<dyn Child + Send + Sync>,
    writer: Box<dyn Write + Send>,
    output: Option<Receiver<ReaderEvent>>,
    pid: Option<u32>,
    master: Box<dyn MasterPty + Send>,
}

impl PtyProcess {
    pub fn spawn(spec: &SpawnSpec) -> Result<Self, HarnessError> {
        let pair = native_pty_system()
            .openpty(spec.size)
            .map_err(HarnessError::OpenPty)?;

        let mut cmd = CommandBuilder::new(&spec.program);
        cmd.args(&spec.args);
        cmd.cwd(&spec.cwd);
        for (key, val) in &spec.env {
            cmd.env(key, val);
        }

        let child = pair
            .slave
            .spawn_command(cmd)
            .map_err(|source| HarnessError::Spawn {
                shell: spec.program.clone(),
                source,
            })?;
        let pid = child.process_id();

        info!(
            program = %spec.program,
            cwd = %spec.cwd.display(),
            pid = ?pid,
            "spawned shell in PTY"
        );

        // Only the child keeps the slave open, so the master sees EOF on exit.
        drop(pair.slave);

        let mut process = Self {
            child,
            writer: Box::new(io::sink()),
            output: None,
            pid,
            master: pair.master,
        };

        // From here on `process` owns the child; an early return kills it.
        let reader = process
            .master
            .try_clone_reader()
            .map_err(HarnessError::Attach)?;
        process.writer = process.master.take_writer().map_err(HarnessError::Attach)?;

        let (tx, rx) = mpsc::sync_channel(CHANNEL_DEPTH);
        thread::Builder::new()
            .name("pty-reader".to_string())
            .spawn(move || pump_output(reader, tx))
            .map_err(HarnessError::Reader)?;
        process.output = Some(rx);

        Ok(process)
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Write raw input to the terminal, as if typed.
    pub fn send(&mut self, input: &str) -> Result<(), HarnessError> {
        self.writer
            .write_all(input.as_bytes())
            .and_then(|()| self.writer.flush())
            .map_err(HarnessError::Inject)?;
        debug!(bytes = input.len(), "wrote input to PTY");
        Ok(())
    }

    pub fn is_alive(&mut self) -> bool {
        match self.child.try_wait() {
            Ok(None) => true,
            Ok(Some(status)) => {
                debug!(success = status.success(), "child has exited");
                false
            }
            Err(e) => {
                warn!("failed to query child status: {e}");
                false
            }
        }
    }

    /// Wait up to `wait` for the next chunk of output.
    pub fn poll(&mut self, wait: Duration) -> Poll {
        let Some(rx) = &self.output else {
            thread::sleep(wait.min(CLOSED_BACKOFF));
            return Poll::Idle;
        };
        match rx.recv_timeout(wait) {
            Ok(ReaderEvent::Data(bytes)) => Poll::Data(bytes),
            Ok(ReaderEvent::Failed(e)) => Poll::Failed(e),
            Ok(ReaderEvent::Closed) | Err(RecvTimeoutError::Disconnected) => {
                debug!("PTY output stream closed");
                self.output = None;
                Poll::Idle
            }
            Err(RecvTimeoutError::Timeout) => Poll::Idle,
        }
    }

    /// SIGKILL the child right away.
    pub fn kill(&mut self) {
        if !self.is_alive() {
            return;
        }
        let killed = match self.pid {
            Some(pid) => force_kill(pid),
            None => self.child.kill(),
        };
        if let Err(e) = killed {
            debug!("force kill failed: {e}");
        }
        self.reap();
    }

    /// Graceful terminate with escalation to SIGKILL by pid. Never fails.
    pub fn terminate(&mut self) {
        if !self.is_alive() {
            return;
        }
        // portable-pty sends SIGHUP, waits briefly, then kills.
        if let Err(e) = self.child.kill() {
            debug!("terminate failed, escalating to SIGKILL: {e}");
            if let Some(pid) = self.pid {
                if let Err(e) = force_kill(pid) {
                    debug!("SIGKILL failed: {e}");
                }
            }
        }
        self.reap();
    }

    fn reap(&mut self) {
        let deadline = Instant::now() + REAP_TIMEOUT;
        while Instant::now() < deadline {
            match self.child.try_wait() {
                Ok(Some(_)) | Err(_) => return,
                Ok(None) => thread::sleep(REAP_INTERVAL),
            }
        }
        warn!(pid = ?self.pid, "child did not exit after kill");
    }
}

impl Drop for PtyProcess {
    fn drop(&mut self) {
        self.terminate();
    }
}

fn pump_output(mut reader: Box<dyn Read + Send>, tx: SyncSender<ReaderEvent>) {
    let mut buf = [0u8; READ_CHUNK];
    loop {
        let event = match reader.read(&mut buf) {
            Ok(0) => ReaderEvent::Closed,
            Ok(n) => {
                trace!(bytes = n, "PTY read");
                ReaderEvent::Data(buf[..n].to_vec())
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) if is_hangup(&e) => ReaderEvent::Closed,
            Err(e) => ReaderEvent::Failed(e),
        };
        let last = !matches!(event, ReaderEvent::Data(_));
        if tx.send(event).is_err() || last {
            return;
        }
    }
}

/// Linux reports EIO on the master once every slave handle is closed.
#[cfg(unix)]
fn is_hangup(err: &io::Error) -> bool {
    err.raw_os_error() == Some(libc::EIO)
}

#[cfg(not(unix))]
fn is_hangup(_err: &io::Error) -> bool {
    false
}

#[cfg(unix)]
fn force_kill(pid: u32) -> io::Result<()> {
    let pid = libc::pid_t::try_from(pid).map_err(io::Error::other)?;
    // SAFETY: kill(2) has no memory-safety preconditions.
    if unsafe { libc::kill(pid, libc::SIGKILL) } == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

#[cfg(not(unix))]
fn force_kill(_pid: u32) -> io::Result<()> {
    Err(io::ErrorKind::Unsupported.into())
}
