use std::error::Error;
use std::io::{self, Write};
use std::process::ExitCode;

use clap::Parser;
use ratatui::layout::Rect;
use ratatui::Frame;
use tracing::info;

use crate::api::ImageData;
use crate::cli::{is_stdio, open_output, read_input, runtime, OllamaArgs, DEFAULT_IMAGE_PROMPT};
use crate::core::command::Command;
use crate::core::component::Component;
use crate::core::config;
use crate::core::message::Msg;
use crate::core::session::Session;
use crate::logging;
use crate::ui::program::Program;

#[derive(Parser, Debug)]
#[command(name = "otui-png-prompt", disable_help_flag = true)]
#[command(about = "Generate an Ollama response about a PNG image")]
#[command(long_about = "Generates an Ollama response from a given PNG image.\n\n\
The prompt may be given with --prompt or the OLLAMATUI_PROMPT env var. The default prompt is:\n  \
Describe this image for a visually impaired person\n\n\
Example:  otui-png-prompt --in hello.png -m llava")]
pub struct Args {
    /// Input PNG filename ('-' is stdin)
    #[arg(short = 'i', long = "in", value_name = "FILE")]
    pub input: Option<String>,

    /// Output text filename (default: stdout)
    #[arg(short = 'o', long = "out", value_name = "FILE")]
    pub output: Option<String>,

    /// Prompt for Ollama (see --help for the default)
    #[arg(short = 'p', long)]
    pub prompt: Option<String>,

    #[command(flatten)]
    pub ollama: OllamaArgs,

    /// Print help
    #[arg(long, action = clap::ArgAction::Help)]
    help: Option<bool>,
}

/// Runs one generation and quits when it is done, optionally echoing
/// partial text as it arrives.
pub struct PromptRunner<W: Write> {
    pub session: Session,
    echo: Option<W>,
}

impl<W: Write> PromptRunner<W> {
    pub fn new(session: Session, echo: Option<W>) -> Self {
        Self { session, echo }
    }
}

impl<W: Write> Component for PromptRunner<W> {
    fn init(&mut self) -> Command {
        Command::batch([
            self.session.init(),
            Command::Emit(self.session.start_generate_msg()),
        ])
    }

    fn update(&mut self, msg: &Msg) -> Command {
        match msg {
            Msg::GenerateResponse { id, response, .. } if *id == self.session.id() => {
                if let Some(echo) = self.echo.as_mut() {
                    let _ = echo.write_all(response.as_bytes()).and_then(|_| echo.flush());
                }
                Command::None
            }
            Msg::GenerateDone { id, .. } if *id == self.session.id() => Command::Quit,
            _ => self.session.update(msg),
        }
    }

    fn render(&self, _frame: &mut Frame, _area: Rect) {}
}

pub fn run(args: Args) -> Result<ExitCode, Box<dyn Error>> {
    logging::init(args.ollama.verbose, None)?;

    let prompt = args
        .prompt
        .filter(|prompt| !prompt.is_empty())
        .or_else(|| Some(config::default_prompt()).filter(|prompt| !prompt.is_empty()))
        .unwrap_or_else(|| DEFAULT_IMAGE_PROMPT.to_string());
    info!(host = %args.ollama.host, model = %args.ollama.model, prompt = %prompt, "png prompt");

    let image = read_input(args.input.as_deref())?;

    let mut session = Session::new();
    session.host = args.ollama.host;
    session.model = args.ollama.model;
    session.prompt = prompt;
    session.images = vec![ImageData(image)];

    let to_stdout = is_stdio(args.output.as_deref());
    let echo = to_stdout.then(io::stdout);
    let runner = runtime()?.block_on(Program::headless(PromptRunner::new(session, echo)).run())?;

    if let Some(err) = runner.session.error() {
        return Err(format!("generation failed: {err}").into());
    }

    let mut out = open_output(args.output.as_deref())?;
    if !to_stdout {
        out.write_all(runner.session.response().as_bytes())?;
    }
    out.write_all(b"\n")?;
    out.flush()?;
    Ok(ExitCode::SUCCESS)
}
