//! Lists the models an Ollama server has pulled and lets the user pick one.
//!
//! The chooser never decides what a pick means: it emits
//! [`Msg::ModelSelected`] or [`Msg::ChooserAborted`] and the owner reacts.

use std::sync::Arc;

use ratatui::crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap};
use ratatui::Frame;
use thiserror::Error;
use tracing::debug;

use crate::api::models::{describe_model, find_model_index};
use crate::api::transport::parse_host;
use crate::api::{HttpTransport, ListModelResponse, SharedError, Transport};
use crate::core::command::{Command, Dispatcher};
use crate::core::component::Component;
use crate::core::config;
use crate::core::ids::ComponentId;
use crate::core::message::Msg;
use crate::ui::picker::PickerState;
use crate::ui::spinner::Spinner;

const PAGE_ROWS: usize = 5;

#[derive(Debug, Error)]
pub enum ChooserError {
    #[error("highlighted row points at model {index} but only {len} are listed; please report this bug")]
    IndexOutOfRange { index: usize, len: usize },
}

pub struct ModelChooser {
    /// Shown next to the spinner while the list loads.
    pub waiting: String,
    /// List title.
    pub menu_prompt: String,
    /// Whether `init` starts a fetch.
    pub fetch_on_init: bool,

    id: ComponentId,
    host: String,
    transport: Arc<dyn Transport>,
    models: Vec<ListModelResponse>,
    has_fetched: bool,
    selected_model: Option<ListModelResponse>,
    selected_name: String,
    picker: PickerState,
    spinner: Spinner,
    is_fetching: bool,
    last_error: Option<SharedError>,
}

impl Default for ModelChooser {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelChooser {
    pub fn new() -> Self {
        Self::with_transport(Arc::new(HttpTransport::new()))
    }

    pub fn with_transport(transport: Arc<dyn Transport>) -> Self {
        Self {
            waiting: "Loading models...".to_string(),
            menu_prompt: "Select Ollama model".to_string(),
            fetch_on_init: true,
            id: ComponentId::next(),
            host: config::default_host(),
            transport,
            models: Vec::new(),
            has_fetched: false,
            selected_model: None,
            selected_name: String::new(),
            picker: PickerState::new(),
            spinner: Spinner::new(),
            is_fetching: false,
            last_error: None,
        }
    }

    pub fn id(&self) -> ComponentId {
        self.id
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Takes effect on the next fetch.
    pub fn set_host(&mut self, host: impl Into<String>) {
        self.host = host.into();
    }

    pub fn is_fetching(&self) -> bool {
        self.is_fetching
    }

    pub fn models(&self) -> &[ListModelResponse] {
        &self.models
    }

    pub fn selected_model(&self) -> Option<&ListModelResponse> {
        self.selected_model.as_ref()
    }

    pub fn error(&self) -> Option<&SharedError> {
        self.last_error.as_ref()
    }

    pub fn filter(&self) -> &str {
        &self.picker.filter
    }

    pub fn fetch_list_msg(&self) -> Msg {
        Msg::FetchModelList { id: self.id }
    }

    /// Select a model by exact name.
    ///
    /// Before the first successful fetch the name is remembered and resolved
    /// when the list arrives; that case returns true. Afterwards it returns
    /// whether the name is in the current list.
    pub fn set_selection_by_name(&mut self, name: &str) -> bool {
        self.selected_name = name.to_string();
        if !self.has_fetched {
            self.selected_model = None;
            return true;
        }
        self.resolve_selection()
    }

    pub fn update(&mut self, msg: &Msg) -> Command {
        match msg {
            Msg::FetchModelList { id } if *id == self.id => self.fetch(),
            Msg::ModelListResponse { id, models, .. } if *id == self.id => {
                self.apply_models(models.clone());
                Command::None
            }
            Msg::ModelListError { id, error, .. } if *id == self.id => {
                debug!(chooser = %self.id, error = %error, "model list fetch failed");
                self.is_fetching = false;
                self.last_error = Some(error.clone());
                Command::None
            }
            Msg::SpinnerTick { .. } => self.spinner.update(msg, self.is_fetching),
            Msg::Key(key) if key.kind == KeyEventKind::Press => self.handle_key(key),
            _ => Command::None,
        }
    }

    fn fetch(&mut self) -> Command {
        self.is_fetching = true;
        debug!(chooser = %self.id, host = %self.host, "fetching model list");
        Command::batch([
            Command::FetchModels(FetchModelsJob {
                chooser_id: self.id,
                host: self.host.clone(),
                transport: self.transport.clone(),
            }),
            self.spinner.start(),
        ])
    }

    fn apply_models(&mut self, models: Vec<ListModelResponse>) {
        self.is_fetching = false;
        self.has_fetched = true;
        self.last_error = None;
        self.models = models;
        self.rebuild_picker();
        self.resolve_selection();
        debug!(chooser = %self.id, count = self.models.len(), "model list updated");
    }

    /// Re-point the selection at the pending name in the current list.
    fn resolve_selection(&mut self) -> bool {
        self.selected_model = None;
        if self.selected_name.is_empty() {
            return false;
        }
        match find_model_index(&self.models, &self.selected_name) {
            Some(index) => {
                self.selected_model = Some(self.models[index].clone());
                self.picker.select_item(index);
                true
            }
            None => false,
        }
    }

    fn rebuild_picker(&mut self) {
        let needle = self.picker.filter.to_lowercase();
        let models = &self.models;
        self.picker.rebuild(models.len(), |index| {
            needle.is_empty() || models[index].name.to_lowercase().contains(&needle)
        });
    }

    fn handle_key(&mut self, key: &KeyEvent) -> Command {
        match key.code {
            KeyCode::Esc => Command::Emit(Msg::ChooserAborted {
                id: self.id,
                error: self.last_error.clone(),
            }),
            KeyCode::Enter => self.confirm(),
            KeyCode::Up => {
                self.picker.move_up();
                Command::None
            }
            KeyCode::Down => {
                self.picker.move_down();
                Command::None
            }
            KeyCode::PageUp => {
                self.picker.page_up(PAGE_ROWS);
                Command::None
            }
            KeyCode::PageDown => {
                self.picker.page_down(PAGE_ROWS);
                Command::None
            }
            KeyCode::Home => {
                self.picker.first();
                Command::None
            }
            KeyCode::End => {
                self.picker.last();
                Command::None
            }
            KeyCode::Backspace => {
                if self.picker.filter.pop().is_some() {
                    self.rebuild_picker();
                }
                Command::None
            }
            KeyCode::Char(c)
                if !key
                    .modifiers
                    .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT) =>
            {
                self.picker.filter.push(c);
                self.rebuild_picker();
                Command::None
            }
            _ => Command::None,
        }
    }

    fn confirm(&mut self) -> Command {
        let Some(index) = self.picker.selected_item() else {
            return Command::None;
        };

        match self.models.get(index) {
            Some(model) => {
                let selection = model.clone();
                self.selected_name = selection.name.clone();
                self.selected_model = Some(selection.clone());
                Command::Emit(Msg::ModelSelected {
                    id: self.id,
                    host: self.host.clone(),
                    selection,
                })
            }
            None => {
                let error: SharedError = Arc::new(ChooserError::IndexOutOfRange {
                    index,
                    len: self.models.len(),
                });
                self.last_error = Some(error.clone());
                Command::Emit(Msg::ChooserAborted {
                    id: self.id,
                    error: Some(error),
                })
            }
        }
    }

    fn render_list(&self, frame: &mut Frame, area: Rect) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(3), Constraint::Length(1)])
            .split(area);

        let title = if self.picker.filter.is_empty() {
            self.menu_prompt.clone()
        } else {
            format!("{} (filter: {})", self.menu_prompt, self.picker.filter)
        };
        let block = Block::default().borders(Borders::ALL).title(title);

        if self.picker.visible().is_empty() {
            let message = format!("No models match \"{}\"", self.picker.filter);
            frame.render_widget(
                Paragraph::new(message)
                    .block(block)
                    .style(Style::default().fg(Color::DarkGray)),
                chunks[0],
            );
        } else {
            let items: Vec<ListItem> = self
                .picker
                .visible()
                .iter()
                .map(|&index| {
                    let model = &self.models[index];
                    let is_selected = self
                        .selected_model
                        .as_ref()
                        .map(|selected| selected.name == model.name)
                        .unwrap_or(false);
                    let marker = if is_selected { " ✓" } else { "" };
                    ListItem::new(vec![
                        Line::from(vec![
                            Span::styled(
                                model.name.clone(),
                                Style::default().add_modifier(Modifier::BOLD),
                            ),
                            Span::styled(marker, Style::default().fg(Color::Green)),
                        ]),
                        Line::from(Span::styled(
                            describe_model(model),
                            Style::default().fg(Color::DarkGray),
                        )),
                    ])
                })
                .collect();

            let list = List::new(items)
                .block(block)
                .highlight_style(Style::default().fg(Color::Black).bg(Color::Cyan))
                .highlight_symbol("▶ ");
            let mut state = ListState::default().with_selected(self.picker.selected_row());
            frame.render_stateful_widget(list, chunks[0], &mut state);
        }

        let help = Paragraph::new("↑/↓ move • type to filter • Enter select • Esc cancel")
            .style(Style::default().fg(Color::DarkGray));
        frame.render_widget(help, chunks[1]);
    }
}

impl Component for ModelChooser {
    fn init(&mut self) -> Command {
        if self.fetch_on_init {
            Command::Emit(self.fetch_list_msg())
        } else {
            Command::None
        }
    }

    fn update(&mut self, msg: &Msg) -> Command {
        ModelChooser::update(self, msg)
    }

    fn render(&self, frame: &mut Frame, area: Rect) {
        let status = if let Some(err) = &self.last_error {
            Some(Paragraph::new(format!("ERROR: {err}")).style(Style::default().fg(Color::Red)))
        } else if self.is_fetching {
            Some(Paragraph::new(format!("{} {}", self.spinner.frame(), self.waiting)))
        } else if self.models.is_empty() {
            Some(Paragraph::new("<empty>"))
        } else {
            None
        };

        match status {
            Some(paragraph) => frame.render_widget(paragraph.wrap(Wrap { trim: false }), area),
            None => self.render_list(frame, area),
        }
    }
}

/// Fetch the model list from `host` and describe the outcome as a message
/// addressed to chooser `id`.
pub async fn fetch_model_list(transport: &dyn Transport, host: &str, id: ComponentId) -> Msg {
    let result = match parse_host(host) {
        Ok(url) => transport.list_models(&url).await,
        Err(err) => Err(err),
    };
    match result {
        Ok(list) => Msg::ModelListResponse {
            id,
            host: host.to_string(),
            models: list.models,
        },
        Err(err) => Msg::ModelListError {
            id,
            host: host.to_string(),
            error: err.shared(),
        },
    }
}

pub struct FetchModelsJob {
    chooser_id: ComponentId,
    host: String,
    transport: Arc<dyn Transport>,
}

impl FetchModelsJob {
    pub fn chooser_id(&self) -> ComponentId {
        self.chooser_id
    }

    pub async fn run(self, dispatcher: Dispatcher) {
        let msg = fetch_model_list(self.transport.as_ref(), &self.host, self.chooser_id).await;
        dispatcher.dispatch(msg);
    }
}
