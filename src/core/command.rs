use std::fmt;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::trace;

use crate::core::embed_session::EmbedJob;
use crate::core::message::Msg;
use crate::core::session::GenerateJob;
use crate::ui::model_chooser::FetchModelsJob;

/// Side effects requested by a component's `update`.
pub enum Command {
    None,
    /// Deliver a message back into the loop.
    Emit(Msg),
    /// Run several commands; emitted messages keep their order.
    Batch(Vec<Command>),
    /// Forward everything arriving on a component's private queue.
    Listen(mpsc::Receiver<Msg>),
    Generate(GenerateJob),
    Embed(EmbedJob),
    FetchModels(FetchModelsJob),
    /// Deliver `msg` once `after` has elapsed.
    Tick { after: Duration, msg: Msg },
    Quit,
}

impl Command {
    /// Combine commands, dropping `None`s and avoiding needless nesting.
    pub fn batch(commands: impl IntoIterator<Item = Command>) -> Command {
        let mut commands: Vec<Command> = commands
            .into_iter()
            .filter(|command| !command.is_none())
            .collect();
        match commands.len() {
            0 => Command::None,
            1 => commands.pop().unwrap_or(Command::None),
            _ => Command::Batch(commands),
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Command::None)
    }

    /// Messages this command would emit immediately, in order.
    pub fn emitted(&self) -> Vec<&Msg> {
        match self {
            Command::Emit(msg) => vec![msg],
            Command::Batch(commands) => commands.iter().flat_map(Command::emitted).collect(),
            _ => Vec::new(),
        }
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::None => write!(f, "None"),
            Command::Emit(msg) => f.debug_tuple("Emit").field(msg).finish(),
            Command::Batch(commands) => f.debug_tuple("Batch").field(commands).finish(),
            Command::Listen(_) => write!(f, "Listen"),
            Command::Generate(job) => write!(f, "Generate(session {})", job.session_id()),
            Command::Embed(job) => write!(f, "Embed(session {})", job.session_id()),
            Command::FetchModels(job) => write!(f, "FetchModels(chooser {})", job.chooser_id()),
            Command::Tick { after, msg } => f
                .debug_struct("Tick")
                .field("after", after)
                .field("msg", msg)
                .finish(),
            Command::Quit => write!(f, "Quit"),
        }
    }
}

/// Sending half of the event loop's queue, handed to background work.
#[derive(Clone)]
pub struct Dispatcher {
    tx: mpsc::UnboundedSender<Msg>,
}

impl Dispatcher {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Msg>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Returns false once the loop has shut down.
    pub fn dispatch(&self, msg: Msg) -> bool {
        self.tx.send(msg).is_ok()
    }

    pub fn dispatch_many<I>(&self, msgs: I)
    where
        I: IntoIterator<Item = Msg>,
    {
        for msg in msgs {
            if !self.dispatch(msg) {
                break;
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Carry out a command. Background work is spawned onto the current tokio
/// runtime and reports back through `dispatcher`.
pub fn execute(command: Command, dispatcher: &Dispatcher) -> Flow {
    match command {
        Command::None => Flow::Continue,
        Command::Emit(msg) => {
            dispatcher.dispatch(msg);
            Flow::Continue
        }
        Command::Batch(commands) => {
            let mut flow = Flow::Continue;
            for command in commands {
                if execute(command, dispatcher) == Flow::Quit {
                    flow = Flow::Quit;
                }
            }
            flow
        }
        Command::Listen(mut rx) => {
            let dispatcher = dispatcher.clone();
            tokio::spawn(async move {
                while let Some(msg) = rx.recv().await {
                    if !dispatcher.dispatch(msg) {
                        break;
                    }
                }
                trace!("delivery queue closed");
            });
            Flow::Continue
        }
        Command::Generate(job) => {
            tokio::spawn(job.run());
            Flow::Continue
        }
        Command::Embed(job) => {
            tokio::spawn(job.run(dispatcher.clone()));
            Flow::Continue
        }
        Command::FetchModels(job) => {
            tokio::spawn(job.run(dispatcher.clone()));
            Flow::Continue
        }
        Command::Tick { after, msg } => {
            let dispatcher = dispatcher.clone();
            tokio::spawn(async move {
                tokio::time::sleep(after).await;
                dispatcher.dispatch(msg);
            });
            Flow::Continue
        }
        Command::Quit => Flow::Quit,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ids::ComponentId;

    #[test]
    fn batch_drops_none_and_unwraps_singletons() {
        assert!(Command::batch([Command::None, Command::None]).is_none());

        let id = ComponentId::next();
        let single = Command::batch([Command::None, Command::Emit(Msg::StartGenerate { id })]);
        assert!(matches!(single, Command::Emit(Msg::StartGenerate { .. })));

        let many = Command::batch([
            Command::Emit(Msg::StartGenerate { id }),
            Command::None,
            Command::Quit,
        ]);
        match many {
            Command::Batch(commands) => assert_eq!(commands.len(), 2),
            other => panic!("expected batch, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn emits_are_delivered_in_order() {
        let (dispatcher, mut rx) = Dispatcher::new();
        let first = ComponentId::next();
        let second = ComponentId::next();

        let flow = execute(
            Command::Batch(vec![
                Command::Emit(Msg::StartGenerate { id: first }),
                Command::Emit(Msg::StopGenerate { id: second }),
            ]),
            &dispatcher,
        );
        assert_eq!(flow, Flow::Continue);

        assert!(matches!(rx.recv().await, Some(Msg::StartGenerate { id }) if id == first));
        assert!(matches!(rx.recv().await, Some(Msg::StopGenerate { id }) if id == second));
    }

    #[tokio::test]
    async fn quit_inside_batch_still_runs_the_rest() {
        let (dispatcher, mut rx) = Dispatcher::new();
        let id = ComponentId::next();

        let flow = execute(
            Command::Batch(vec![Command::Quit, Command::Emit(Msg::StopEmbed { id })]),
            &dispatcher,
        );
        assert_eq!(flow, Flow::Quit);
        assert!(matches!(rx.try_recv(), Ok(Msg::StopEmbed { .. })));
    }

    #[tokio::test]
    async fn listen_forwards_a_private_queue() {
        let (dispatcher, mut rx) = Dispatcher::new();
        let (tx, private_rx) = mpsc::channel(4);
        execute(Command::Listen(private_rx), &dispatcher);

        let id = ComponentId::next();
        tx.send(Msg::FetchModelList { id }).await.unwrap();
        assert!(matches!(rx.recv().await, Some(Msg::FetchModelList { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn tick_fires_after_delay() {
        let (dispatcher, mut rx) = Dispatcher::new();
        let id = ComponentId::next();
        execute(
            Command::Tick {
                after: Duration::from_millis(100),
                msg: Msg::SpinnerTick { id, tag: 7 },
            },
            &dispatcher,
        );

        assert!(rx.try_recv().is_err());
        let msg = rx.recv().await;
        assert!(matches!(msg, Some(Msg::SpinnerTick { tag: 7, .. })));
    }
}
