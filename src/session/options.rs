use std::path::{Path, PathBuf};
use std::time::Duration;

use portable_pty::PtySize;

use crate::config::HarnessConfig;
use crate::error::HarnessError;
use crate::invocation::DEFAULT_PROGRAM;

pub const DEFAULT_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_SHELL: &str = "zsh";

/// Disables color and cursor tricks in the child's output.
const NO_COLOR_ENV: (&str, &str) = ("NO_COLOR", "1");

/// Interactive shell started inside the PTY.
#[derive(Debug, Clone, PartialEq)]
pub struct ShellCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl ShellCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: vec![],
        }
    }

    pub fn with_args<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}

impl Default for ShellCommand {
    fn default() -> Self {
        Self::new(DEFAULT_SHELL)
    }
}

/// Settings for one run. Not modified once the run starts.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Where `instructions.md` is written and the shell starts.
    pub cwd: PathBuf,
    /// Mirror diagnostics (start, raw chunks, prompt events) to stderr.
    pub debug: bool,
    /// Wall-clock budget for the whole run. Must be positive.
    pub timeout_secs: u64,
    pub shell: ShellCommand,
    /// Assistant executable typed into the shell.
    pub program: String,
    /// Also export variables that force a plain, fixed-size terminal.
    pub plain_terminal: bool,
    /// Extra child-only variables, applied after the built-in ones.
    pub env: Vec<(String, String)>,
    pub pty_size: PtySize,
}

impl SessionOptions {
    pub fn new(cwd: impl Into<PathBuf>) -> Self {
        Self {
            cwd: cwd.into(),
            debug: false,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            shell: ShellCommand::default(),
            program: DEFAULT_PROGRAM.to_string(),
            plain_terminal: false,
            env: vec![],
            pty_size: PtySize {
                rows: 24,
                cols: 80,
                pixel_width: 0,
                pixel_height: 0,
            },
        }
    }

    pub fn from_config(cwd: &Path, config: &HarnessConfig) -> Self {
        let session = &config.session;
        Self {
            cwd: cwd.to_path_buf(),
            debug: session.debug,
            timeout_secs: session.timeout_secs,
            shell: ShellCommand::with_args(&session.shell, &session.shell_args),
            program: session.program.clone(),
            plain_terminal: session.plain_terminal,
            env: session
                .env
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            pty_size: PtySize {
                rows: config.pty.rows,
                cols: config.pty.cols,
                pixel_width: 0,
                pixel_height: 0,
            },
        }
    }

    pub fn timeout(&self) -> Result<Duration, HarnessError> {
        if self.timeout_secs == 0 {
            return Err(HarnessError::InvalidTimeout);
        }
        Ok(Duration::from_secs(self.timeout_secs))
    }

    /// Variables layered onto the inherited environment of the child.
    pub fn child_env(&self) -> Vec<(String, String)> {
        let mut env = vec![(NO_COLOR_ENV.0.to_string(), NO_COLOR_ENV.1.to_string())];
        if self.plain_terminal {
            env.extend([
                ("FORCE_COLOR".to_string(), "0".to_string()),
                ("NO_CLEAR_LINE".to_string(), "1".to_string()),
                ("TERM".to_string(), "dumb".to_string()),
                ("COLUMNS".to_string(), self.pty_size.cols.to_string()),
                ("LINES".to_string(), self.pty_size.rows.to_string()),
            ]);
        }
        env.extend(self.env.iter().cloned());
        env
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let options = SessionOptions::new("/work");
        assert_eq!(options.cwd, PathBuf::from("/work"));
        assert!(!options.debug);
        assert_eq!(options.timeout_secs, 60);
        assert_eq!(options.shell, ShellCommand::new("zsh"));
        assert_eq!(options.program, "codebuff");
        assert_eq!(options.pty_size.rows, 24);
        assert_eq!(options.pty_size.cols, 80);
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let mut options = SessionOptions::new("/work");
        options.timeout_secs = 0;
        assert!(matches!(options.timeout(), Err(HarnessError::InvalidTimeout)));
        options.timeout_secs = 5;
        assert_eq!(options.timeout().unwrap(), Duration::from_secs(5));
    }

    #[test]
    fn child_env_always_disables_color() {
        let options = SessionOptions::new("/work");
        assert_eq!(
            options.child_env(),
            vec![("NO_COLOR".to_string(), "1".to_string())]
        );
    }

    #[test]
    fn plain_terminal_adds_fixed_geometry() {
        let mut options = SessionOptions::new("/work");
        options.plain_terminal = true;
        options.env.push(("TERM".to_string(), "xterm".to_string()));
        let env = options.child_env();
        assert!(env.contains(&("TERM".to_string(), "dumb".to_string())));
        assert!(env.contains(&("COLUMNS".to_string(), "80".to_string())));
        assert!(env.contains(&("LINES".to_string(), "24".to_string())));
        // User entries come last so they win when applied in order.
        assert_eq!(
            env.last(),
            Some(&("TERM".to_string(), "xterm".to_string()))
        );
    }

    #[test]
    fn from_config_copies_settings() {
        let config: HarnessConfig = toml::from_str(
            r#"
[session]
timeout_secs = 90
debug = true
shell = "bash"
shell_args = ["--norc", "-i"]
program = "/opt/codebuff"

[session.env]
CODEBUFF_MODE = "max"

[pty]
rows = 40
cols = 120
"#,
        )
        .unwrap();
        let options = SessionOptions::from_config(Path::new("/repo"), &config);
        assert_eq!(options.cwd, PathBuf::from("/repo"));
        assert!(options.debug);
        assert_eq!(options.timeout_secs, 90);
        assert_eq!(options.shell, ShellCommand::with_args("bash", ["--norc", "-i"]));
        assert_eq!(options.program, "/opt/codebuff");
        assert_eq!(
            options.env,
            vec![("CODEBUFF_MODE".to_string(), "max".to_string())]
        );
        assert_eq!(options.pty_size.rows, 40);
        assert_eq!(options.pty_size.cols, 120);
    }
}
