use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::invocation::DEFAULT_PROGRAM;
use crate::session::{DEFAULT_SHELL, DEFAULT_TIMEOUT_SECS};

const CONFIG_FILENAME: &str = "config.toml";
const CONFIG_DIR: &str = ".codebuff-harness";

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_shell() -> String {
    DEFAULT_SHELL.to_string()
}

fn default_program() -> String {
    DEFAULT_PROGRAM.to_string()
}

fn default_pty_rows() -> u16 {
    24
}

fn default_pty_cols() -> u16 {
    80
}

/// How each run is launched.
///
/// ```toml
/// [session]
/// timeout_secs = 90
/// shell = "bash"
/// shell_args = ["-i"]
///
/// [session.env]
/// CODEBUFF_MODE = "lite"
/// ```
#[derive(Debug, Deserialize, Serialize)]
pub struct SessionSettings {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub debug: bool,
    #[serde(default = "default_shell")]
    pub shell: String,
    #[serde(default)]
    pub shell_args: Vec<String>,
    #[serde(default = "default_program")]
    pub program: String,
    /// Prompt used when none is given on the command line.
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub plain_terminal: bool,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            debug: false,
            shell: default_shell(),
            shell_args: vec![],
            program: default_program(),
            prompt: None,
            plain_terminal: false,
            env: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct PtySettings {
    #[serde(default = "default_pty_rows")]
    pub rows: u16,
    #[serde(default = "default_pty_cols")]
    pub cols: u16,
}

impl Default for PtySettings {
    fn default() -> Self {
        Self {
            rows: default_pty_rows(),
            cols: default_pty_cols(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Default)]
pub struct HarnessConfig {
    #[serde(default)]
    pub session: SessionSettings,
    #[serde(default)]
    pub pty: PtySettings,
}

impl HarnessConfig {
    /// Search upward from `start` for a `.codebuff-harness/config.toml` file and load it.
    /// Returns the default config if no file is found.
    pub fn load(start: &Path) -> Result<(Self, Option<PathBuf>)> {
        if let Some(path) = Self::find_config_file(start) {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            let config: HarnessConfig = toml::from_str(&contents)
                .with_context(|| format!("failed to parse {}", path.display()))?;
            Ok((config, Some(path)))
        } else {
            Ok((HarnessConfig::default(), None))
        }
    }

    fn find_config_file(start: &Path) -> Option<PathBuf> {
        let mut dir = start.to_path_buf();
        loop {
            let candidate = dir.join(CONFIG_DIR).join(CONFIG_FILENAME);
            if candidate.is_file() {
                return Some(candidate);
            }
            if !dir.pop() {
                return None;
            }
        }
    }
}
