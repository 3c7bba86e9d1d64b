mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::info;

use cli::{Cli, Command};
use codebuff_harness::{HarnessConfig, Response, SessionOptions, ShellCommand, execute};

fn config_source_label(config_path: Option<&Path>) -> String {
    config_path
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "(defaults, no .codebuff-harness/config.toml found)".to_string())
}

fn push_kv(output: &mut String, key: &str, value: impl std::fmt::Display) {
    output.push_str(&format!("  {key:<20} {value}\n"));
}

fn render_config_human(config: &HarnessConfig, config_path: Option<&Path>) -> String {
    let session = &config.session;
    let mut output = String::new();
    output.push_str("Session\n");
    push_kv(&mut output, "timeout_secs", session.timeout_secs);
    push_kv(&mut output, "debug", session.debug);
    push_kv(&mut output, "shell", &session.shell);
    if session.shell_args.is_empty() {
        push_kv(&mut output, "shell_args", "(none)");
    } else {
        push_kv(&mut output, "shell_args", session.shell_args.join(", "));
    }
    push_kv(&mut output, "program", &session.program);
    push_kv(
        &mut output,
        "prompt",
        session.prompt.as_deref().unwrap_or("(default)"),
    );
    push_kv(&mut output, "plain_terminal", session.plain_terminal);
    output.push('\n');

    output.push_str("Child Environment\n");
    if session.env.is_empty() {
        push_kv(&mut output, "entries", "(none)");
    } else {
        for (key, value) in &session.env {
            output.push_str(&format!("  - {key}={value}\n"));
        }
    }
    output.push('\n');

    output.push_str("PTY\n");
    push_kv(&mut output, "rows", config.pty.rows);
    push_kv(&mut output, "cols", config.pty.cols);
    output.push('\n');

    output.push_str("Source Path\n");
    push_kv(&mut output, "path", config_source_label(config_path));

    output
}

fn render_config_json(config: &HarnessConfig, config_path: Option<&Path>) -> Result<String> {
    let payload = serde_json::json!({
        "session": &config.session,
        "pty": &config.pty,
        "source_path": config_source_label(config_path)
    });

    serde_json::to_string_pretty(&payload).context("failed to serialize config to JSON")
}

fn render_response_human(response: &Response) -> String {
    let mut output = String::new();
    match response {
        Response::Success { output: text } => {
            output.push_str("Codebuff Response:\n");
            output.push_str(text);
            output.push('\n');
        }
        Response::Failure { output: partial, error } => {
            output.push_str("Error executing Codebuff:\n");
            output.push_str(&format!("Message: {}\n", error.message));
            output.push_str(&format!("Code: {}\n", error.code));
            if let Some(details) = &error.details {
                output.push_str(&format!("Details: {details}\n"));
            }
            if !partial.is_empty() {
                output.push_str("\nPartial output before error:\n");
                output.push_str(partial);
                output.push('\n');
            }
        }
    }
    output
}

fn read_instructions(inline: Option<String>, file: Option<PathBuf>) -> Result<String> {
    if let Some(text) = inline {
        return Ok(text);
    }
    if let Some(path) = file {
        return std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read instructions from {}", path.display()));
    }
    let mut text = String::new();
    std::io::stdin()
        .read_to_string(&mut text)
        .context("failed to read instructions from stdin")?;
    Ok(text)
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let is_config_command = matches!(&cli.command, Command::Config { .. });

    let filter = match cli.verbose {
        0 if is_config_command => "codebuff_harness=warn",
        0 => "codebuff_harness=info",
        1 => "codebuff_harness=debug",
        _ => "codebuff_harness=trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cwd = std::env::current_dir().context("failed to get current directory (was it deleted?)")?;

    match cli.command {
        Command::Run {
            cwd: work_dir,
            instructions,
            instructions_file,
            prompt,
            timeout,
            debug,
            shell,
            program,
            json,
        } => {
            let work_dir = work_dir.unwrap_or(cwd);
            let (config, config_path) = HarnessConfig::load(&work_dir)?;
            match config_path {
                Some(ref p) => info!("loaded config from {}", p.display()),
                None => info!("no .codebuff-harness/config.toml found, using defaults"),
            }

            let instructions = read_instructions(instructions, instructions_file)?;

            let mut options = SessionOptions::from_config(&work_dir, &config);
            options.debug |= debug;
            if let Some(secs) = timeout {
                options.timeout_secs = secs;
            }
            if let Some(shell) = shell {
                options.shell = ShellCommand::new(shell);
            }
            if let Some(program) = program {
                options.program = program;
            }
            let prompt = prompt.or_else(|| config.session.prompt.clone());

            if options.debug {
                eprintln!("[codebuff-harness] executing codebuff...");
            }
            let response = execute(&instructions, &options, prompt.as_deref());

            if json {
                let rendered = serde_json::to_string_pretty(&response)
                    .context("failed to serialize response to JSON")?;
                println!("{rendered}");
            } else {
                print!("{}", render_response_human(&response));
            }

            Ok(if response.is_success() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Command::Config { json } => {
            let (config, config_path) = HarnessConfig::load(&cwd)?;
            if json {
                println!("{}", render_config_json(&config, config_path.as_deref())?);
            } else {
                print!("{}", render_config_human(&config, config_path.as_deref()));
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codebuff_harness::{ErrorCode, ErrorInfo};

    #[test]
    fn renders_success_response() {
        let response = Response::Success {
            output: "hello".to_string(),
        };
        assert_eq!(
            render_response_human(&response),
            "Codebuff Response:\nhello\n"
        );
    }

    #[test]
    fn renders_failure_with_partial_output() {
        let response = Response::Failure {
            output: "> ".to_string(),
            error: ErrorInfo {
                message: "Timeout after 1 seconds".to_string(),
                code: ErrorCode::Timeout,
                details: None,
            },
        };
        let rendered = render_response_human(&response);
        assert!(rendered.starts_with("Error executing Codebuff:\n"));
        assert!(rendered.contains("Message: Timeout after 1 seconds\n"));
        assert!(rendered.contains("Code: TIMEOUT\n"));
        assert!(!rendered.contains("Details:"));
        assert!(rendered.ends_with("\nPartial output before error:\n> \n"));
    }

    #[test]
    fn renders_failure_details() {
        let response = Response::Failure {
            output: String::new(),
            error: ErrorInfo {
                message: "boom".to_string(),
                code: ErrorCode::ExecutionError,
                details: Some(serde_json::json!({"kind": "spawn"})),
            },
        };
        let rendered = render_response_human(&response);
        assert!(rendered.contains("Details: {\"kind\":\"spawn\"}\n"));
        assert!(!rendered.contains("Partial output"));
    }

    #[test]
    fn render_config_human_lists_sections() {
        let config = HarnessConfig::default();
        let rendered = render_config_human(&config, None);
        assert!(rendered.contains("Session\n"));
        assert!(rendered.contains("  shell                zsh\n"));
        assert!(rendered.contains("  shell_args           (none)\n"));
        assert!(rendered.contains("Child Environment\n  entries              (none)\n"));
        assert!(rendered.contains("  cols                 80\n"));
        assert!(rendered.contains("no .codebuff-harness/config.toml found"));
    }

    #[test]
    fn render_config_json_includes_source() {
        let config = HarnessConfig::default();
        let rendered = render_config_json(&config, Some(Path::new("/repo/.codebuff-harness/config.toml"))).unwrap();
        let value: serde_json::Value = serde_json::from_str(&rendered).unwrap();
        assert_eq!(value["session"]["timeout_secs"], 60);
        assert_eq!(value["pty"]["rows"], 24);
        assert_eq!(
            value["source_path"],
            "/repo/.codebuff-harness/config.toml"
        );
    }

    #[test]
    fn inline_instructions_win() {
        let text = read_instructions(Some("inline".to_string()), None).unwrap();
        assert_eq!(text, "inline");
    }

    #[test]
    fn instructions_from_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("task.md");
        std::fs::write(&path, "from file\n").unwrap();
        assert_eq!(read_instructions(None, Some(path)).unwrap(), "from file\n");
    }

    #[test]
    fn missing_instructions_file_is_an_error() {
        let err = read_instructions(None, Some(PathBuf::from("/nonexistent/task.md"))).unwrap_err();
        assert!(format!("{err}").contains("failed to read instructions"));
    }
}
