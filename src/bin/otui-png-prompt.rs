use std::process::ExitCode;

use ollamatui::cli::{png_prompt, run_tool};

fn main() -> ExitCode {
    run_tool(png_prompt::run)
}
