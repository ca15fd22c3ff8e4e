//! Prompt input, streamed output and a pop-up model chooser around one
//! [`Session`].

use ratatui::crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::symbols::border;
use ratatui::widgets::{Block, Borders, Clear, Padding, Paragraph, Wrap};
use ratatui::Frame;
use tracing::debug;
use tui_textarea::{Input, TextArea};

use crate::core::command::Command;
use crate::core::component::Component;
use crate::core::message::Msg;
use crate::core::session::Session;
use crate::ui::model_chooser::ModelChooser;
use crate::ui::spinner::Spinner;
use crate::utils::scroll::ScrollCalculator;

pub const DEFAULT_WIDTH: u16 = 40;
pub const DEFAULT_HEIGHT: u16 = 20;
pub const DEFAULT_INPUT_HEIGHT: u16 = 4;
pub const INPUT_CHAR_LIMIT: usize = 300;

const PLACEHOLDER: &str = "Enter your prompt here...";

/// Draws the `| ` prompt in front of every input row.
const PROMPT_BORDER: border::Set = border::Set {
    vertical_left: "|",
    ..border::PLAIN
};

pub struct ChatPanel {
    pub session: Session,
    pub chooser: ModelChooser,
    /// Put the prompt above the output instead of below it.
    pub input_on_top: bool,

    width: u16,
    height: u16,
    input_height: u16,
    choosing: bool,
    spinner: Spinner,
    input: TextArea<'static>,
    scroll: u16,
    follow_output: bool,
}

impl ChatPanel {
    pub fn new(session: Session) -> Self {
        let mut chooser = ModelChooser::with_transport(session.transport());
        chooser.set_host(session.host.clone());
        chooser.fetch_on_init = false;
        chooser.set_selection_by_name(&session.model);

        let mut input = TextArea::default();
        input.set_placeholder_text(PLACEHOLDER);
        input.set_cursor_line_style(Style::default());
        input.set_block(
            Block::default()
                .borders(Borders::LEFT)
                .border_set(PROMPT_BORDER)
                .padding(Padding::left(1))
                .border_style(Style::default().fg(Color::Cyan)),
        );

        Self {
            session,
            chooser,
            input_on_top: false,
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            input_height: DEFAULT_INPUT_HEIGHT,
            choosing: false,
            spinner: Spinner::new(),
            input,
            scroll: 0,
            follow_output: true,
        }
    }

    pub fn width(&self) -> u16 {
        self.width
    }

    pub fn height(&self) -> u16 {
        self.height
    }

    pub fn input_height(&self) -> u16 {
        self.input_height
    }

    pub fn is_choosing(&self) -> bool {
        self.choosing
    }

    pub fn set_size(&mut self, width: u16, height: u16) {
        self.width = width;
        self.height = height;
        self.set_input_height(self.input_height);
    }

    /// Clamped so the output keeps at least one row.
    pub fn set_input_height(&mut self, rows: u16) {
        let max = self.height.saturating_sub(1).max(1);
        self.input_height = rows.clamp(1, max);
    }

    pub fn input_value(&self) -> String {
        self.input.lines().join("\n")
    }

    pub fn set_input_value(&mut self, text: &str) {
        self.input.select_all();
        self.input.cut();
        self.input.insert_str(text);
    }

    pub fn set_placeholder(&mut self, text: &str) {
        self.input.set_placeholder_text(text.to_string());
    }

    pub fn update(&mut self, msg: &Msg) -> Command {
        match msg {
            Msg::Resize { width, height } => {
                self.set_size(*width, *height);
                Command::None
            }
            Msg::Key(key) if key.kind == KeyEventKind::Press => {
                if self.choosing {
                    self.chooser.update(msg)
                } else {
                    self.handle_key(key)
                }
            }
            Msg::ModelSelected { id, selection, .. } if *id == self.chooser.id() => {
                debug!(model = %selection.name, "model selected");
                self.session.model = selection.name.clone();
                self.choosing = false;
                Command::None
            }
            Msg::ChooserAborted { id, .. } if *id == self.chooser.id() => {
                self.choosing = false;
                Command::None
            }
            Msg::SpinnerTick { .. } => Command::batch([
                self.spinner.update(msg, self.session.is_generating()),
                self.chooser.update(msg),
            ]),
            _ => Command::batch([self.session.update(msg), self.chooser.update(msg)]),
        }
    }

    fn handle_key(&mut self, key: &KeyEvent) -> Command {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        let shift = key.modifiers.contains(KeyModifiers::SHIFT);

        match key.code {
            KeyCode::Char('p') if ctrl => self.open_chooser(),
            KeyCode::Esc if self.session.is_generating() => {
                Command::Emit(self.session.stop_generate_msg())
            }
            KeyCode::Enter if key.modifiers.is_empty() => self.submit(),
            KeyCode::Up if shift => {
                self.set_input_height(self.input_height.saturating_add(1));
                Command::None
            }
            KeyCode::Down if shift => {
                self.set_input_height(self.input_height.saturating_sub(1));
                Command::None
            }
            KeyCode::PageUp => {
                let current = self.current_scroll(self.output_rows());
                self.follow_output = false;
                self.scroll = current.saturating_sub(self.output_rows().max(1));
                Command::None
            }
            KeyCode::PageDown => {
                let rows = self.output_rows();
                let bottom = ScrollCalculator::scroll_to_bottom(&self.output_text(), self.width, rows);
                self.scroll = self.current_scroll(rows).saturating_add(rows.max(1));
                if self.scroll >= bottom {
                    self.scroll = bottom;
                    self.follow_output = true;
                }
                Command::None
            }
            // The prompt is a single line; Ctrl+M and Ctrl+J would insert newlines.
            KeyCode::Char('m') | KeyCode::Char('j') if ctrl => Command::None,
            KeyCode::Enter => Command::None,
            KeyCode::Char(_) if self.input_value().chars().count() >= INPUT_CHAR_LIMIT => {
                Command::None
            }
            _ => {
                self.input.input(Input::from(*key));
                Command::None
            }
        }
    }

    fn open_chooser(&mut self) -> Command {
        self.choosing = true;
        self.chooser.set_host(self.session.host.clone());
        self.chooser.set_selection_by_name(&self.session.model);
        Command::Emit(self.chooser.fetch_list_msg())
    }

    fn submit(&mut self) -> Command {
        let value = self.input_value();
        if value.is_empty() || value == self.session.prompt {
            return Command::None;
        }

        self.session.prompt = value;
        self.session.clear_response();
        self.scroll = 0;
        self.follow_output = true;
        Command::batch([
            Command::Emit(self.session.start_generate_msg()),
            self.spinner.start(),
        ])
    }

    fn output_text(&self) -> String {
        self.session.view()
    }

    /// Rows available to the output, excluding its title row.
    fn output_rows(&self) -> u16 {
        self.height
            .saturating_sub(self.input_height)
            .saturating_sub(1)
    }

    fn current_scroll(&self, rows: u16) -> u16 {
        let bottom = ScrollCalculator::scroll_to_bottom(&self.output_text(), self.width, rows);
        if self.follow_output {
            bottom
        } else {
            self.scroll.min(bottom)
        }
    }

    fn render_output(&self, frame: &mut Frame, area: Rect) {
        let mut title = format!(" {} ", self.session.model);
        if self.session.is_generating() {
            title = format!(" {} {}", self.spinner.frame(), title.trim_start());
        }
        let block = Block::default()
            .borders(Borders::TOP)
            .title(title)
            .border_style(Style::default().fg(Color::DarkGray));

        let rows = area.height.saturating_sub(1);
        let text = self.output_text();
        let bottom = ScrollCalculator::scroll_to_bottom(&text, area.width, rows);
        let scroll = if self.follow_output {
            bottom
        } else {
            self.scroll.min(bottom)
        };

        let style = if self.session.error().is_some() {
            Style::default().fg(Color::Red)
        } else {
            Style::default()
        };

        let paragraph = Paragraph::new(text)
            .block(block)
            .style(style)
            .wrap(Wrap { trim: false })
            .scroll((scroll, 0));
        frame.render_widget(paragraph, area);
    }

    fn render_chooser(&self, frame: &mut Frame, area: Rect) {
        let overlay = Rect {
            x: area.x + area.width.min(2) / 2,
            y: area.y + area.height.min(2) / 2,
            width: area.width.saturating_sub(2).max(1),
            height: area.height.saturating_sub(2).max(1),
        };
        frame.render_widget(Clear, overlay);
        let block = Block::default()
            .borders(Borders::ALL)
            .title(" Ctrl+P model ")
            .title_style(Style::default().add_modifier(Modifier::BOLD));
        let inner = block.inner(overlay);
        frame.render_widget(block, overlay);
        self.chooser.render(frame, inner);
    }
}

impl Component for ChatPanel {
    fn init(&mut self) -> Command {
        Command::batch([self.session.init(), self.chooser.init()])
    }

    fn update(&mut self, msg: &Msg) -> Command {
        ChatPanel::update(self, msg)
    }

    fn render(&self, frame: &mut Frame, area: Rect) {
        let input_rows = self.input_height.min(area.height.saturating_sub(1));
        let constraints = if self.input_on_top {
            [Constraint::Length(input_rows), Constraint::Min(0)]
        } else {
            [Constraint::Min(0), Constraint::Length(input_rows)]
        };
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints(constraints)
            .split(area);
        let (input_area, output_area) = if self.input_on_top {
            (chunks[0], chunks[1])
        } else {
            (chunks[1], chunks[0])
        };

        self.render_output(frame, output_area);
        frame.render_widget(&self.input, input_area);

        if self.choosing {
            self.render_chooser(frame, area);
        }
    }
}
