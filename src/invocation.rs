//! The command line typed into the shell.
//!
//! The assistant is invoked as `<program> . "<prompt>"`. The prompt goes
//! through POSIX double-quote escaping so its text cannot leave the quoted
//! argument or start a second command.

/// Name of the artifact the assistant reads its task from.
pub const INSTRUCTIONS_FILE: &str = "instructions.md";

pub const DEFAULT_PROGRAM: &str = "codebuff";

pub const DEFAULT_PROMPT: &str = "Please solve the problem specified in instructions.md.";

/// Build the full input line, trailing newline included.
pub fn invocation_line(program: &str, prompt: &str) -> String {
    format!("{program} . {}\n", double_quote(prompt))
}

/// Wrap `text` in double quotes, escaping the characters the shell still
/// interprets inside them. Line breaks become spaces: a raw newline inside an
/// open quote would leave the shell sitting at its continuation prompt.
pub fn double_quote(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    let mut last_was_break = false;
    for c in text.chars() {
        match c {
            '\r' | '\n' => {
                if !last_was_break {
                    out.push(' ');
                }
                last_was_break = true;
                continue;
            }
            '"' | '\\' | '$' | '`' => {
                out.push('\\');
                out.push(c);
            }
            _ => out.push(c),
        }
        last_was_break = false;
    }
    out.push('"');
    out
}
