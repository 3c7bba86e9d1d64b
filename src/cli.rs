use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "codebuff-harness",
    about = "Run a code assistant in a PTY and capture its response",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Write instructions.md, invoke the assistant, print its response
    Run {
        /// Working directory for the assistant (defaults to the current directory)
        #[arg(long)]
        cwd: Option<PathBuf>,

        /// Instructions text (read from stdin when neither this nor --instructions-file is given)
        #[arg(long, conflicts_with = "instructions_file")]
        instructions: Option<String>,

        /// Read instructions from a file
        #[arg(long)]
        instructions_file: Option<PathBuf>,

        /// Prompt passed to the assistant
        #[arg(long)]
        prompt: Option<String>,

        /// Timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,

        /// Write diagnostics (raw output, prompt events) to stderr
        #[arg(long)]
        debug: bool,

        /// Shell to start inside the PTY
        #[arg(long)]
        shell: Option<String>,

        /// Assistant executable to invoke
        #[arg(long)]
        program: Option<String>,

        /// Print the response as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show effective configuration
    Config {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
}
