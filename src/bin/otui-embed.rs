use std::process::ExitCode;

use ollamatui::cli::{embed, run_tool};

fn main() -> ExitCode {
    run_tool(embed::run)
}
