use std::process::ExitCode;

use ollamatui::cli::{simplegen, run_tool};

fn main() -> ExitCode {
    run_tool(simplegen::run)
}
