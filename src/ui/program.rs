//! The event loop that hosts a root [`Component`].
//!
//! Terminal events and background results arrive on one queue. Each message
//! is offered to the root component, the returned command is executed, and
//! the screen is redrawn once the queue has been drained.

use std::{
    error::Error,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use ratatui::crossterm::event::{self, Event, KeyEventKind};
use tokio::sync::mpsc;
use tracing::debug;

use crate::core::command::{execute, Dispatcher, Flow};
use crate::core::component::Component;
use crate::core::message::Msg;
use crate::ui::lifecycle::{restore_terminal, setup_terminal, AppTerminal};

const INPUT_POLL_INTERVAL: Duration = Duration::from_millis(50);

enum Mode {
    Interactive,
    Headless,
}

pub struct Program<C: Component> {
    model: C,
    mode: Mode,
}

impl<C: Component> Program<C> {
    /// Full-screen program reading keys from the terminal.
    pub fn new(model: C) -> Self {
        Self {
            model,
            mode: Mode::Interactive,
        }
    }

    /// Same loop without a terminal. Only `init` and background work can
    /// produce messages, so the model has to quit on its own.
    pub fn headless(model: C) -> Self {
        Self {
            model,
            mode: Mode::Headless,
        }
    }

    /// Run until the model returns [`Command::Quit`](crate::core::command::Command::Quit),
    /// handing the model back.
    pub async fn run(self) -> Result<C, Box<dyn Error>> {
        match self.mode {
            Mode::Headless => {
                let (dispatcher, rx) = Dispatcher::new();
                let mut model = self.model;
                drive(&mut model, &dispatcher, rx, |_| Ok(())).await?;
                Ok(model)
            }
            Mode::Interactive => {
                let mut terminal = setup_terminal()?;
                let mut model = self.model;
                let result = run_interactive(&mut model, &mut terminal).await;
                restore_terminal(&mut terminal)?;
                result.map(|_| model)
            }
        }
    }
}

async fn run_interactive<C: Component>(
    model: &mut C,
    terminal: &mut AppTerminal,
) -> Result<(), Box<dyn Error>> {
    let (dispatcher, rx) = Dispatcher::new();

    let size = terminal.size()?;
    dispatcher.dispatch(Msg::Resize {
        width: size.width,
        height: size.height,
    });

    let stop = Arc::new(AtomicBool::new(false));
    let reader = spawn_event_reader(dispatcher.clone(), stop.clone());

    let result = drive(model, &dispatcher, rx, |model: &C| {
        terminal.draw(|frame| {
            let area = frame.area();
            model.render(frame, area);
        })?;
        Ok(())
    })
    .await;

    stop.store(true, Ordering::Relaxed);
    let _ = reader.await;
    result
}

async fn drive<C, F>(
    model: &mut C,
    dispatcher: &Dispatcher,
    mut rx: mpsc::UnboundedReceiver<Msg>,
    mut redraw: F,
) -> Result<(), Box<dyn Error>>
where
    C: Component,
    F: FnMut(&C) -> Result<(), Box<dyn Error>>,
{
    if execute(model.init(), dispatcher) == Flow::Quit {
        return Ok(());
    }
    redraw(&*model)?;

    while let Some(msg) = rx.recv().await {
        if step(model, dispatcher, &msg) == Flow::Quit {
            return Ok(());
        }
        while let Ok(msg) = rx.try_recv() {
            if step(model, dispatcher, &msg) == Flow::Quit {
                return Ok(());
            }
        }
        redraw(&*model)?;
    }
    Ok(())
}

fn step<C: Component>(model: &mut C, dispatcher: &Dispatcher, msg: &Msg) -> Flow {
    let flow = execute(model.update(msg), dispatcher);
    if flow == Flow::Quit {
        debug!("program quitting");
    }
    flow
}

/// Blocking crossterm reader. Stops when `stop` is set or the loop is gone.
fn spawn_event_reader(
    dispatcher: Dispatcher,
    stop: Arc<AtomicBool>,
) -> tokio::task::JoinHandle<()> {
    tokio::task::spawn_blocking(move || {
        while !stop.load(Ordering::Relaxed) {
            match event::poll(INPUT_POLL_INTERVAL) {
                Ok(true) => {}
                Ok(false) => continue,
                Err(err) => {
                    debug!(error = %err, "terminal event poll failed");
                    break;
                }
            }
            let event = match event::read() {
                Ok(event) => event,
                Err(err) => {
                    debug!(error = %err, "terminal event read failed");
                    break;
                }
            };
            if let Some(msg) = event_to_msg(event) {
                if !dispatcher.dispatch(msg) {
                    break;
                }
            }
        }
    })
}

/// Key presses and resizes become messages; everything else is dropped.
fn event_to_msg(event: Event) -> Option<Msg> {
    match event {
        Event::Key(key) if key.kind == KeyEventKind::Press => Some(Msg::Key(key)),
        Event::Resize(width, height) => Some(Msg::Resize { width, height }),
        _ => None,
    }
}
