use std::process::ExitCode;

use ollamatui::cli::{model_chooser, run_tool};

fn main() -> ExitCode {
    run_tool(model_chooser::run)
}
