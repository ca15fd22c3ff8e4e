use std::process::ExitCode;

use ollamatui::cli::{timechart, run_tool};

fn main() -> ExitCode {
    run_tool(timechart::run)
}
