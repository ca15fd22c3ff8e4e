use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use ratatui::crossterm::event::{KeyCode, KeyModifiers};
use ratatui::layout::Rect;
use ratatui::Frame;
use tracing::info;

use crate::api::{ListModelResponse, SharedError};
use crate::cli::{runtime, OllamaArgs};
use crate::core::command::Command;
use crate::core::component::Component;
use crate::core::message::Msg;
use crate::logging;
use crate::ui::model_chooser::ModelChooser;
use crate::ui::program::Program;

#[derive(Parser, Debug)]
#[command(name = "otui-model-chooser", disable_help_flag = true)]
#[command(about = "Pick one of the models on an Ollama server")]
#[command(long_about = "Lists the models pulled on an Ollama server and prints the one you pick.\n\n\
Example:  otui-model-chooser -h http://gpu:11434 --log chooser.log")]
pub struct Args {
    #[command(flatten)]
    pub ollama: OllamaArgs,

    /// Append logs to this file instead of discarding them
    #[arg(long, value_name = "FILE")]
    pub log: Option<PathBuf>,

    /// Print help
    #[arg(long, action = clap::ArgAction::Help)]
    help: Option<bool>,
}

/// How a chooser run ended.
#[derive(Debug, Default)]
pub enum Outcome {
    #[default]
    Interrupted,
    Selected(ListModelResponse),
    Aborted(Option<SharedError>),
}

pub struct ChooserApp {
    pub chooser: ModelChooser,
    pub outcome: Outcome,
}

impl ChooserApp {
    pub fn new(chooser: ModelChooser) -> Self {
        Self {
            chooser,
            outcome: Outcome::default(),
        }
    }
}

impl Component for ChooserApp {
    fn init(&mut self) -> Command {
        self.chooser.init()
    }

    fn update(&mut self, msg: &Msg) -> Command {
        match msg {
            Msg::Key(key)
                if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) =>
            {
                Command::Quit
            }
            Msg::ModelSelected { id, selection, .. } if *id == self.chooser.id() => {
                self.outcome = Outcome::Selected(selection.clone());
                Command::Quit
            }
            Msg::ChooserAborted { id, error } if *id == self.chooser.id() => {
                self.outcome = Outcome::Aborted(error.clone());
                Command::Quit
            }
            _ => self.chooser.update(msg),
        }
    }

    fn render(&self, frame: &mut Frame, area: Rect) {
        self.chooser.render(frame, area);
    }
}

pub fn run(args: Args) -> Result<ExitCode, Box<dyn Error>> {
    // Stderr belongs to the terminal UI, so logs only go to a file.
    if let Some(path) = &args.log {
        logging::init(args.ollama.verbose, Some(path))?;
    }
    info!(host = %args.ollama.host, "model chooser");

    let mut chooser = ModelChooser::new();
    chooser.set_host(args.ollama.host);
    chooser.set_selection_by_name(&args.ollama.model);

    let app = runtime()?.block_on(Program::new(ChooserApp::new(chooser)).run())?;
    Ok(report(&app.outcome))
}

fn report(outcome: &Outcome) -> ExitCode {
    match outcome {
        Outcome::Selected(model) => {
            println!("Selected:   {}  {}", model.name, model.digest);
            ExitCode::SUCCESS
        }
        Outcome::Aborted(Some(err)) => {
            eprintln!("Chooser Aborted: {err}");
            ExitCode::FAILURE
        }
        Outcome::Aborted(None) | Outcome::Interrupted => {
            eprintln!("No selection");
            ExitCode::SUCCESS
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::test_utils::{model_entry, FakeTransport, Harness};
    use ratatui::crossterm::event::KeyEvent;

    fn key(code: KeyCode) -> Msg {
        Msg::Key(KeyEvent::new(code, KeyModifiers::NONE))
    }

    fn app_with(fake: &std::sync::Arc<FakeTransport>) -> ChooserApp {
        let mut chooser = ModelChooser::with_transport(fake.clone());
        chooser.set_host("http://localhost:11434");
        ChooserApp::new(chooser)
    }

    #[tokio::test]
    async fn enter_records_the_selection_and_quits() {
        let fake = FakeTransport::with_models(vec![
            model_entry("llama3.2:latest", "a80c4f17acd5"),
            model_entry("llava:7b", "8dd30f6b0cb1"),
        ]);
        let mut app = app_with(&fake);
        let mut harness = Harness::new();
        harness.run(app.init());
        harness
            .drive(&mut app, |msg| matches!(msg, Msg::ModelListResponse { .. }))
            .await;

        app.update(&key(KeyCode::Down));
        let command = app.update(&key(KeyCode::Enter));
        let selected = command.emitted().into_iter().cloned().collect::<Vec<_>>();
        assert_eq!(selected.len(), 1);
        assert!(matches!(app.update(&selected[0]), Command::Quit));

        match &app.outcome {
            Outcome::Selected(model) => assert_eq!(model.name, "llava:7b"),
            other => panic!("unexpected outcome {other:?}"),
        }
        assert_eq!(report(&app.outcome), ExitCode::SUCCESS);
    }

    #[tokio::test]
    async fn escape_after_a_failed_fetch_reports_the_error() {
        let fake = FakeTransport::new();
        fake.fail_listing("connection refused");
        let mut app = app_with(&fake);
        let mut harness = Harness::new();
        harness.run(app.init());
        harness
            .drive(&mut app, |msg| matches!(msg, Msg::ModelListError { .. }))
            .await;

        let abort = app.update(&key(KeyCode::Esc));
        let abort = abort.emitted().into_iter().cloned().collect::<Vec<_>>();
        assert!(matches!(app.update(&abort[0]), Command::Quit));

        match &app.outcome {
            Outcome::Aborted(Some(err)) => assert!(err.to_string().contains("connection refused")),
            other => panic!("unexpected outcome {other:?}"),
        }
        assert_eq!(report(&app.outcome), ExitCode::FAILURE);
    }

    #[test]
    fn ctrl_c_quits_without_a_selection() {
        let mut app = app_with(&FakeTransport::new());
        let quit = app.update(&Msg::Key(KeyEvent::new(
            KeyCode::Char('c'),
            KeyModifiers::CONTROL,
        )));
        assert!(matches!(quit, Command::Quit));
        assert!(matches!(app.outcome, Outcome::Interrupted));
        assert_eq!(report(&app.outcome), ExitCode::SUCCESS);
    }
}
