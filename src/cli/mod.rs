//! Command-line tools built on the library components.
//!
//! Each `otui-*` binary is a thin `main` that hands its [`clap`] parser and
//! tool function to [`run_tool`]. The tools share flag groups, stdin/stdout
//! handling and the exit-code convention: 0 on success, 1 with an
//! `ERROR: ...` line on stderr otherwise.

pub mod ansi_to_png;
pub mod embed;
pub mod model_chooser;
pub mod png_prompt;
pub mod simplegen;
pub mod timechart;

use std::error::Error;
use std::fs::File;
use std::io::{self, Read, Write};
use std::path::Path;
use std::process::ExitCode;

use clap::error::ErrorKind;
use clap::{Args, Parser};

use crate::core::config;

pub const DEFAULT_IMAGE_PROMPT: &str = "Describe this image for a visually impaired person";

/// Flags shared by every tool that talks to Ollama. `-h` is the host, so
/// help is `--help` only.
#[derive(Args, Debug, Clone)]
pub struct OllamaArgs {
    /// Host for Ollama (also OLLAMATUI_HOST env)
    #[arg(short = 'h', long, default_value_t = config::default_host())]
    pub host: String,

    /// Model for Ollama (also OLLAMATUI_MODEL env)
    #[arg(short = 'm', long, default_value_t = config::default_model())]
    pub model: String,

    /// Verbose output
    #[arg(short = 'v', long)]
    pub verbose: bool,
}

/// Parse arguments, run `tool`, and turn the outcome into an exit code.
pub fn run_tool<A, F>(tool: F) -> ExitCode
where
    A: Parser,
    F: FnOnce(A) -> Result<ExitCode, Box<dyn Error>>,
{
    let args = match A::try_parse() {
        Ok(args) => args,
        Err(err) => return report_parse_error(err),
    };

    match tool(args) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("ERROR: {err}");
            ExitCode::FAILURE
        }
    }
}

fn report_parse_error(err: clap::Error) -> ExitCode {
    match err.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
            let _ = err.print();
            ExitCode::SUCCESS
        }
        _ => {
            let rendered = err.to_string();
            eprintln!("ERROR: {}", rendered.trim_start_matches("error: ").trim_end());
            ExitCode::FAILURE
        }
    }
}

/// Multi-threaded runtime for a tool's async body.
pub fn runtime() -> io::Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
}

/// `None` and `-` mean stdin.
pub fn is_stdio(path: Option<&str>) -> bool {
    matches!(path, None | Some("") | Some("-"))
}

/// Read a whole input file, or stdin.
pub fn read_input(path: Option<&str>) -> Result<Vec<u8>, Box<dyn Error>> {
    let mut data = Vec::new();
    match path {
        Some(path) if !is_stdio(Some(path)) => {
            let mut file = File::open(path)
                .map_err(|err| format!("failed to open input file {path}: {err}"))?;
            file.read_to_end(&mut data)
                .map_err(|err| format!("failed to read file {path}: {err}"))?;
        }
        _ => {
            io::stdin()
                .read_to_end(&mut data)
                .map_err(|err| format!("failed to read stdin: {err}"))?;
        }
    }
    Ok(data)
}

/// Create (truncating) an output file, or use stdout.
pub fn open_output(path: Option<&str>) -> Result<Box<dyn Write>, Box<dyn Error>> {
    match path {
        Some(path) if !is_stdio(Some(path)) => {
            let file = File::create(Path::new(path))
                .map_err(|err| format!("failed to open output file {path}: {err}"))?;
            Ok(Box::new(file))
        }
        _ => Ok(Box::new(io::stdout())),
    }
}
