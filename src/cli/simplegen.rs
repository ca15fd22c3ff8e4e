use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use ratatui::crossterm::event::{KeyCode, KeyModifiers};
use ratatui::layout::Rect;
use ratatui::Frame;
use tracing::info;

use crate::cli::{runtime, OllamaArgs};
use crate::core::command::Command;
use crate::core::component::Component;
use crate::core::message::Msg;
use crate::core::session::Session;
use crate::logging;
use crate::ui::chat_panel::ChatPanel;
use crate::ui::program::Program;

#[derive(Parser, Debug)]
#[command(name = "otui-simplegen", disable_help_flag = true)]
#[command(about = "Prompt an Ollama model in a small terminal UI")]
#[command(long_about = "Type a prompt and press Enter to stream a response.\n\n\
Ctrl+P picks another model, Esc stops a response, Shift+Up/Down resize the prompt \
and Ctrl+C quits.\n\n\
Example:  otui-simplegen -m llama3.2 --log simplegen.log")]
pub struct Args {
    #[command(flatten)]
    pub ollama: OllamaArgs,

    /// Append logs to this file
    #[arg(long, value_name = "FILE")]
    pub log: Option<PathBuf>,

    /// Print help
    #[arg(long, action = clap::ArgAction::Help)]
    help: Option<bool>,
}

pub struct SimpleGen {
    pub panel: ChatPanel,
}

impl Component for SimpleGen {
    fn init(&mut self) -> Command {
        self.panel.init()
    }

    fn update(&mut self, msg: &Msg) -> Command {
        match msg {
            Msg::Key(key)
                if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) =>
            {
                Command::Quit
            }
            _ => self.panel.update(msg),
        }
    }

    fn render(&self, frame: &mut Frame, area: Rect) {
        self.panel.render(frame, area);
    }
}

pub fn run(args: Args) -> Result<ExitCode, Box<dyn Error>> {
    if let Some(path) = &args.log {
        logging::init(args.ollama.verbose, Some(path))?;
    }
    info!(host = %args.ollama.host, model = %args.ollama.model, "simplegen");

    let mut session = Session::new();
    session.host = args.ollama.host;
    session.model = args.ollama.model;
    // The prompt box starts empty even when a default prompt is configured.
    session.prompt = String::new();

    let app = SimpleGen {
        panel: ChatPanel::new(session),
    };
    runtime()?.block_on(Program::new(app).run())?;
    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::test_utils::{render_to_string, FakeTransport};
    use ratatui::crossterm::event::KeyEvent;

    fn app() -> SimpleGen {
        let mut session = Session::with_transport(FakeTransport::new());
        session.host = "http://localhost:11434".to_string();
        session.model = "llama3.2:latest".to_string();
        SimpleGen {
            panel: ChatPanel::new(session),
        }
    }

    #[test]
    fn ctrl_c_quits() {
        let mut app = app();
        let command = app.update(&Msg::Key(KeyEvent::new(
            KeyCode::Char('c'),
            KeyModifiers::CONTROL,
        )));
        assert!(matches!(command, Command::Quit));
    }

    #[test]
    fn other_keys_reach_the_prompt() {
        let mut app = app();
        app.update(&Msg::Key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::NONE)));
        assert_eq!(app.panel.input_value(), "c");

        app.update(&Msg::Resize {
            width: 50,
            height: 12,
        });
        assert_eq!((app.panel.width(), app.panel.height()), (50, 12));
    }

    #[test]
    fn renders_the_model_title() {
        let screen = render_to_string(&app(), 40, 8);
        assert!(screen.contains("llama3.2:latest"));
    }

    #[test]
    fn host_and_log_flags_parse() {
        let args =
            Args::try_parse_from(["otui-simplegen", "-h", "http://gpu:11434", "--log", "gen.log"])
                .expect("parse");
        assert_eq!(args.ollama.host, "http://gpu:11434");
        assert_eq!(args.log, Some(PathBuf::from("gen.log")));
    }
}
