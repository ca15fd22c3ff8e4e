use std::error::Error;
use std::io::Write;
use std::process::ExitCode;

use clap::Parser;

use crate::cli::{open_output, read_input};
use crate::convert::convert_terminal_text_to_image;

#[derive(Parser, Debug)]
#[command(name = "otui-ansi-to-png", disable_help_flag = true)]
#[command(about = "Render ANSI terminal text as a PNG image")]
#[command(
    long_about = "Converts ANSI terminal text from stdin (or a file with --in) and renders it \
as a PNG image saved to --out.\n\n\
If --in is '-' then stdin is used. If --out is '-' then stdout is used.\n\n\
Example:  echo -e \"\\033[31mHello\\033[0m World\" | otui-ansi-to-png --out hello.png"
)]
pub struct Args {
    /// Input text filename (default: stdin)
    #[arg(short = 'i', long = "in", value_name = "FILE")]
    pub input: Option<String>,

    /// Output PNG filename ('-' is stdout)
    #[arg(short = 'o', long = "out", value_name = "FILE")]
    pub output: String,

    /// Print help
    #[arg(long, action = clap::ArgAction::Help)]
    help: Option<bool>,
}

pub fn run(args: Args) -> Result<ExitCode, Box<dyn Error>> {
    let data = read_input(args.input.as_deref())?;
    let text = String::from_utf8_lossy(&data);

    let png = convert_terminal_text_to_image(&text, None)
        .map_err(|err| format!("failed to convert to PNG: {err}"))?;

    let mut out = open_output(Some(&args.output))?;
    out.write_all(&png)
        .and_then(|_| out.flush())
        .map_err(|err| format!("failed to write PNG: {err}"))?;
    Ok(ExitCode::SUCCESS)
}
