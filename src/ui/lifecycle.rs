use std::{error::Error, io, io::Write, panic};

use ratatui::backend::CrosstermBackend;
use ratatui::crossterm::{
    cursor::Show,
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::Terminal;

pub type AppTerminal<W = io::Stdout> = Terminal<CrosstermBackend<W>>;

/// Raw mode plus the alternate screen, with a panic hook that puts the
/// terminal back before the panic message prints.
pub fn setup_terminal() -> Result<AppTerminal, Box<dyn Error>> {
    enable_raw_mode()?;

    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).inspect_err(|_| {
        let _ = disable_raw_mode();
    })?;

    let terminal = Terminal::new(CrosstermBackend::new(stdout)).inspect_err(|_| {
        let _ = disable_raw_mode();
    })?;
    install_panic_hook();
    Ok(terminal)
}

pub fn restore_terminal<W: Write>(terminal: &mut AppTerminal<W>) -> Result<(), Box<dyn Error>> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

fn install_panic_hook() {
    let previous = panic::take_hook();
    panic::set_hook(Box::new(move |info| {
        let _ = disable_raw_mode();
        let _ = leave_screen(&mut io::stdout());
        previous(info);
    }));
}

fn leave_screen<W: Write>(writer: &mut W) -> io::Result<()> {
    execute!(writer, LeaveAlternateScreen, Show)
}
