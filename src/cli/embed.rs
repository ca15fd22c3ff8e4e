use std::error::Error;
use std::io::Write;
use std::process::ExitCode;

use clap::Parser;
use ratatui::layout::Rect;
use ratatui::Frame;
use tracing::info;

use crate::cli::{open_output, read_input, runtime, OllamaArgs};
use crate::core::command::Command;
use crate::core::component::Component;
use crate::core::embed_session::EmbedSession;
use crate::core::message::Msg;
use crate::logging;
use crate::ui::program::Program;

#[derive(Parser, Debug)]
#[command(name = "otui-embed", disable_help_flag = true)]
#[command(about = "Create an embedding for the input data")]
#[command(long_about = "Creates an embedding for the input data and writes the response as JSON \
to stdout, or to --out.\n\n\
Example:  otui-embed --in hello.txt -m all-minilm")]
pub struct Args {
    /// Input filename ('-' is stdin)
    #[arg(short = 'i', long = "in", value_name = "FILE")]
    pub input: String,

    /// Output filename ('-' is stdout)
    #[arg(short = 'o', long = "out", value_name = "FILE")]
    pub output: Option<String>,

    #[command(flatten)]
    pub ollama: OllamaArgs,

    /// Print help
    #[arg(long, action = clap::ArgAction::Help)]
    help: Option<bool>,
}

/// Runs one embedding and quits once it has landed or failed.
pub struct EmbedRunner {
    pub session: EmbedSession,
}

impl Component for EmbedRunner {
    fn init(&mut self) -> Command {
        Command::Emit(self.session.start_embed_msg())
    }

    fn update(&mut self, msg: &Msg) -> Command {
        let command = self.session.update(msg);
        match msg {
            Msg::EmbedResponse { id, .. } | Msg::EmbedError { id, .. }
                if *id == self.session.id() && !self.session.is_embedding() =>
            {
                Command::Quit
            }
            _ => command,
        }
    }

    fn render(&self, _frame: &mut Frame, _area: Rect) {}
}

pub fn run(args: Args) -> Result<ExitCode, Box<dyn Error>> {
    logging::init(args.ollama.verbose, None)?;
    info!(host = %args.ollama.host, model = %args.ollama.model, "embed");

    // Fail on an unwritable output before spending a request.
    let mut out = open_output(args.output.as_deref())?;
    let input = read_input(Some(&args.input))?;
    let input = String::from_utf8_lossy(&input).into_owned();

    let session = EmbedSession::new()
        .with_host(args.ollama.host)
        .with_model(args.ollama.model)
        .with_input(input);
    let runner = runtime()?.block_on(Program::headless(EmbedRunner { session }).run())?;

    let Some(response) = runner.session.response() else {
        return Err(match runner.session.error() {
            Some(err) => format!("embedding failed: {err}").into(),
            None => "no embedding response".into(),
        });
    };

    serde_json::to_writer(&mut out, response)?;
    out.write_all(b"\n")?;
    out.flush()?;
    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::test_utils::{EmbedScript, FakeTransport};

    fn runner_with(fake: &std::sync::Arc<FakeTransport>, host: &str) -> EmbedRunner {
        EmbedRunner {
            session: EmbedSession::with_transport(fake.clone())
                .with_host(host)
                .with_model("all-minilm")
                .with_input("hello"),
        }
    }

    #[tokio::test]
    async fn runner_stops_after_the_response() {
        let fake = FakeTransport::new();
        fake.push_embed(EmbedScript {
            embeddings: vec![vec![0.25, -0.5]],
            ..EmbedScript::default()
        });

        let runner = Program::headless(runner_with(&fake, "http://localhost:11434"))
            .run()
            .await
            .expect("run");

        let response = runner.session.response().expect("response");
        assert_eq!(response.embeddings, vec![vec![0.25, -0.5]]);
        assert_eq!(fake.embed_calls(), 1);

        let json = serde_json::to_value(response).expect("json");
        assert_eq!(json["model"], "all-minilm");
    }

    #[tokio::test]
    async fn runner_stops_on_invalid_host() {
        let fake = FakeTransport::new();
        let runner = Program::headless(runner_with(&fake, "ftp://nowhere"))
            .run()
            .await
            .expect("run");

        assert!(runner.session.response().is_none());
        assert!(runner.session.error().is_some());
        assert_eq!(fake.embed_calls(), 0);
    }

    #[test]
    fn input_is_required() {
        assert!(Args::try_parse_from(["otui-embed"]).is_err());
        let args = Args::try_parse_from(["otui-embed", "--in", "-"]).expect("parse");
        assert_eq!(args.input, "-");
    }
}
