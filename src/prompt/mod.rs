//! Shell-prompt boundary detection over raw PTY output.
//!
//! The assistant's answer is whatever appears between two prompt lines. A
//! prompt line is any line that, once reduced to printable ASCII and trimmed,
//! contains [`PROMPT_MARKER`].
//!
//! ## State machine
//!
//! ```text
//! AwaitingFirstPrompt   → marker at line i → AwaitingSecondPrompt { start_index: i + 1 }
//! AwaitingSecondPrompt  → marker at line j → capture lines[start_index..j]
//!                                            non-empty → done
//!                                            empty     → stay (sticky)
//! ```
//!
//! The second state is sticky: an empty capture never resets the start
//! boundary, so any later line containing the marker closes the block. The
//! heuristic also fires on response text that itself contains `>` (diffs,
//! comparisons, quoted shell sessions).

use tracing::debug;

/// Character whose presence marks a shell-prompt line.
pub const PROMPT_MARKER: char = '>';

/// Progress lines ending with this are dropped from the capture.
pub const THINKING_SUFFIX: &str = "Thinking...";

/// Keep printable ASCII (32..=126) only, then trim.
pub fn clean_line(line: &str) -> String {
    line.chars()
        .filter(|c| (' '..='~').contains(c))
        .collect::<String>()
        .trim()
        .to_string()
}

pub fn is_prompt_line(line: &str) -> bool {
    clean_line(line).contains(PROMPT_MARKER)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScanState {
    #[default]
    AwaitingFirstPrompt,
    AwaitingSecondPrompt {
        /// Index (into the non-blank lines) of the first line after the opening prompt.
        start_index: usize,
    },
}

/// Scans the whole accumulated buffer after every read.
///
/// State persists across scans for the lifetime of one run, so the opening
/// prompt found on an early read still bounds a capture closed much later.
#[derive(Debug, Default)]
pub struct PromptScanner {
    state: ScanState,
}

impl PromptScanner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ScanState {
        self.state
    }

    /// Returns the captured response once a closing prompt bounds a non-empty block.
    pub fn scan(&mut self, buffer: &str) -> Option<String> {
        let lines: Vec<&str> = buffer
            .lines()
            .filter(|line| !line.trim().is_empty())
            .collect();

        for (index, line) in lines.iter().enumerate() {
            if !is_prompt_line(line) {
                continue;
            }
            match self.state {
                ScanState::AwaitingFirstPrompt => {
                    debug!(line = index, text = %clean_line(line), "found first prompt");
                    self.state = ScanState::AwaitingSecondPrompt {
                        start_index: index + 1,
                    };
                }
                ScanState::AwaitingSecondPrompt { start_index } => {
                    if let Some(output) = capture(&lines, start_index, index) {
                        debug!(line = index, text = %clean_line(line), "found second prompt");
                        return Some(output);
                    }
                }
            }
        }
        None
    }
}

fn capture(lines: &[&str], start: usize, end: usize) -> Option<String> {
    let kept: Vec<&str> = lines
        .get(start..end)?
        .iter()
        .copied()
        .filter(|line| !line.trim().ends_with(THINKING_SUFFIX))
        .collect();
    if kept.is_empty() {
        return None;
    }
    Some(kept.join("\n").trim().to_string())
}
