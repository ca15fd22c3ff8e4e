use std::process::ExitCode;

use ollamatui::cli::{ansi_to_png, run_tool};

fn main() -> ExitCode {
    run_tool(ansi_to_png::run)
}
