use std::time::Duration;

use crate::core::command::Command;
use crate::core::ids::ComponentId;
use crate::core::message::Msg;

const FRAMES: [&str; 8] = ["⣾", "⣽", "⣻", "⢿", "⡿", "⣟", "⣯", "⣷"];
pub const SPINNER_INTERVAL: Duration = Duration::from_millis(100);

/// Braille activity indicator advanced by [`Msg::SpinnerTick`].
///
/// Every `start` bumps the tag, so an older tick chain dies at its next tick
/// instead of doubling the animation speed.
#[derive(Debug)]
pub struct Spinner {
    id: ComponentId,
    tag: u64,
    frame: usize,
}

impl Default for Spinner {
    fn default() -> Self {
        Self::new()
    }
}

impl Spinner {
    pub fn new() -> Self {
        Self {
            id: ComponentId::next(),
            tag: 0,
            frame: 0,
        }
    }

    pub fn frame(&self) -> &'static str {
        FRAMES[self.frame]
    }

    pub fn start(&mut self) -> Command {
        self.tag += 1;
        self.schedule()
    }

    /// Advance on our own tick and keep ticking while `active`.
    pub fn update(&mut self, msg: &Msg, active: bool) -> Command {
        match msg {
            Msg::SpinnerTick { id, tag } if *id == self.id && *tag == self.tag => {
                self.frame = (self.frame + 1) % FRAMES.len();
                if active {
                    self.schedule()
                } else {
                    Command::None
                }
            }
            _ => Command::None,
        }
    }

    fn schedule(&self) -> Command {
        Command::Tick {
            after: SPINNER_INTERVAL,
            msg: Msg::SpinnerTick {
                id: self.id,
                tag: self.tag,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tick_of(command: &Command) -> Msg {
        match command {
            Command::Tick { msg, .. } => msg.clone(),
            other => panic!("expected tick, got {other:?}"),
        }
    }

    #[test]
    fn ticks_advance_frames_while_active() {
        let mut spinner = Spinner::new();
        let tick = tick_of(&spinner.start());

        let next = spinner.update(&tick, true);
        assert_eq!(spinner.frame(), FRAMES[1]);
        assert!(matches!(next, Command::Tick { .. }));

        let last = spinner.update(&tick_of(&next), false);
        assert_eq!(spinner.frame(), FRAMES[2]);
        assert!(last.is_none());
    }

    #[test]
    fn restarting_retires_the_old_chain() {
        let mut spinner = Spinner::new();
        let stale = tick_of(&spinner.start());
        let fresh = tick_of(&spinner.start());

        assert!(spinner.update(&stale, true).is_none());
        assert_eq!(spinner.frame(), FRAMES[0]);
        assert!(!spinner.update(&fresh, true).is_none());
    }
}
