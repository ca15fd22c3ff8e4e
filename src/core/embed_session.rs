use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use ratatui::layout::Rect;
use ratatui::widgets::Paragraph;
use ratatui::Frame;
use reqwest::Url;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::api::transport::parse_host;
use crate::api::{
    EmbedInput, EmbedRequest, EmbedResponse, HttpTransport, Options, SharedError, Transport,
};
use crate::core::command::{Command, Dispatcher};
use crate::core::component::Component;
use crate::core::config;
use crate::core::ids::ComponentId;
use crate::core::message::Msg;

/// One embedding request at a time. Results arrive whole, as a single
/// [`Msg::EmbedResponse`] or [`Msg::EmbedError`].
pub struct EmbedSession {
    pub host: String,
    pub model: String,
    pub input: EmbedInput,
    pub keep_alive: Option<Duration>,
    pub truncate: Option<bool>,
    pub options: Options,

    id: ComponentId,
    transport: Arc<dyn Transport>,
    is_embedding: bool,
    response: Option<EmbedResponse>,
    last_error: Option<SharedError>,
    cancel_token: Option<CancellationToken>,
    request_seq: u64,
    in_flight: Arc<Mutex<()>>,
}

impl Default for EmbedSession {
    fn default() -> Self {
        Self::new()
    }
}

impl EmbedSession {
    pub fn new() -> Self {
        Self::with_transport(Arc::new(HttpTransport::new()))
    }

    pub fn with_transport(transport: Arc<dyn Transport>) -> Self {
        let defaults = config::defaults();
        Self {
            host: defaults.host.clone(),
            model: defaults.model.clone(),
            input: EmbedInput::default(),
            keep_alive: None,
            truncate: None,
            options: Options::new(),
            id: ComponentId::next(),
            transport,
            is_embedding: false,
            response: None,
            last_error: None,
            cancel_token: None,
            request_seq: 0,
            in_flight: Arc::new(Mutex::new(())),
        }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_input(mut self, input: impl Into<EmbedInput>) -> Self {
        self.input = input.into();
        self
    }

    /// A zero duration leaves keep-alive to the server.
    pub fn with_keep_alive(mut self, keep_alive: Duration) -> Self {
        self.keep_alive = (!keep_alive.is_zero()).then_some(keep_alive);
        self
    }

    pub fn with_truncate(mut self, truncate: bool) -> Self {
        self.truncate = Some(truncate);
        self
    }

    pub fn with_options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }

    pub fn id(&self) -> ComponentId {
        self.id
    }

    pub fn is_embedding(&self) -> bool {
        self.is_embedding
    }

    pub fn response(&self) -> Option<&EmbedResponse> {
        self.response.as_ref()
    }

    pub fn error(&self) -> Option<&SharedError> {
        self.last_error.as_ref()
    }

    pub fn start_embed_msg(&self) -> Msg {
        Msg::StartEmbed { id: self.id }
    }

    pub fn stop_embed_msg(&self) -> Msg {
        Msg::StopEmbed { id: self.id }
    }

    pub fn view(&self) -> String {
        match &self.last_error {
            Some(err) => format!("ERROR: {err}"),
            None => String::new(),
        }
    }

    pub fn update(&mut self, msg: &Msg) -> Command {
        match msg {
            Msg::StartEmbed { id } if *id == self.id => self.start(),
            Msg::StopEmbed { id } if *id == self.id => {
                self.cancel_active();
                Command::None
            }
            Msg::EmbedResponse {
                id,
                request,
                response,
                ..
            } if self.is_current(*id, *request) => {
                self.finish();
                self.response = Some(response.clone());
                self.last_error = None;
                debug!(session = %self.id, vectors = response.embeddings.len(), "embedding finished");
                Command::None
            }
            Msg::EmbedError {
                id, request, error, ..
            } if self.is_current(*id, *request) => {
                self.finish();
                self.record_failure(error.clone());
                Command::None
            }
            _ => Command::None,
        }
    }

    fn is_current(&self, id: ComponentId, request: u64) -> bool {
        id == self.id && request == self.request_seq && self.is_embedding
    }

    fn start(&mut self) -> Command {
        if self.is_embedding {
            debug!(session = %self.id, request = self.request_seq, "superseding active embedding");
            self.cancel_active();
        }
        self.request_seq += 1;

        let host = match parse_host(&self.host) {
            Ok(host) => host,
            Err(err) => {
                let error = err.shared();
                self.record_failure(error.clone());
                return Command::Emit(Msg::EmbedError {
                    id: self.id,
                    request: self.request_seq,
                    created_at: Utc::now(),
                    error,
                });
            }
        };

        let cancel_token = CancellationToken::new();
        self.cancel_token = Some(cancel_token.clone());
        self.is_embedding = true;
        debug!(session = %self.id, request = self.request_seq, model = %self.model, "starting embedding");

        Command::Embed(EmbedJob {
            session_id: self.id,
            request: self.request_seq,
            host,
            body: EmbedRequest {
                model: self.model.clone(),
                input: self.input.clone(),
                truncate: self.truncate,
                keep_alive: self.keep_alive,
                options: self.options.clone(),
            },
            transport: self.transport.clone(),
            cancel_token,
            in_flight: self.in_flight.clone(),
        })
    }

    fn cancel_active(&mut self) {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }
        self.is_embedding = false;
    }

    fn finish(&mut self) {
        self.is_embedding = false;
        self.cancel_token = None;
    }

    fn record_failure(&mut self, error: SharedError) {
        debug!(session = %self.id, error = %error, "embedding failed");
        self.response = None;
        self.last_error = Some(error);
    }
}

impl Component for EmbedSession {
    fn update(&mut self, msg: &Msg) -> Command {
        EmbedSession::update(self, msg)
    }

    fn render(&self, frame: &mut Frame, area: Rect) {
        frame.render_widget(Paragraph::new(self.view()), area);
    }
}

pub struct EmbedJob {
    session_id: ComponentId,
    request: u64,
    host: Url,
    body: EmbedRequest,
    transport: Arc<dyn Transport>,
    cancel_token: CancellationToken,
    in_flight: Arc<Mutex<()>>,
}

impl EmbedJob {
    pub fn session_id(&self) -> ComponentId {
        self.session_id
    }

    pub async fn run(self, dispatcher: Dispatcher) {
        let EmbedJob {
            session_id,
            request,
            host,
            body,
            transport,
            cancel_token,
            in_flight,
        } = self;

        tokio::select! {
            biased;
            _ = cancel_token.cancelled() => {
                debug!(session = %session_id, request, "embedding cancelled");
            }
            result = async {
                let _slot = in_flight.lock().await;
                transport.embed(&host, &body).await
            } => {
                let created_at = Utc::now();
                let msg = match result {
                    Ok(response) => Msg::EmbedResponse {
                        id: session_id,
                        request,
                        created_at,
                        response,
                    },
                    Err(err) => Msg::EmbedError {
                        id: session_id,
                        request,
                        created_at,
                        error: err.shared(),
                    },
                };
                dispatcher.dispatch(msg);
            }
        }
    }
}
