use ratatui::layout::Rect;
use ratatui::Frame;

use crate::core::command::Command;
use crate::core::message::Msg;

/// A piece of UI state driven by the event loop.
///
/// `update` is the only place state changes. Work that has to wait on the
/// network is described by the returned [`Command`] and its result comes
/// back later as another [`Msg`].
pub trait Component {
    fn init(&mut self) -> Command {
        Command::None
    }

    fn update(&mut self, msg: &Msg) -> Command;

    fn render(&self, frame: &mut Frame, area: Rect);
}
