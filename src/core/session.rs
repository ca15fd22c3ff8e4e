//! One streaming text generation against an Ollama server.
//!
//! A [`Session`] owns the request parameters and the accumulated response.
//! Network work runs on a spawned [`GenerateJob`] that reports back through
//! the session's bounded delivery queue, so state only changes inside
//! [`Session::update`].

use std::sync::Arc;

use chrono::Utc;
use futures_util::StreamExt;
use ratatui::layout::Rect;
use ratatui::widgets::{Paragraph, Wrap};
use ratatui::Frame;
use reqwest::Url;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::api::transport::parse_host;
use crate::api::{
    ApiError, GenerateRequest, GenerateResponse, HttpTransport, ImageData, Options, SharedError,
    Transport,
};
use crate::core::command::Command;
use crate::core::component::Component;
use crate::core::config;
use crate::core::ids::ComponentId;
use crate::core::message::Msg;

/// Deliveries a worker may queue before it waits on the event loop.
pub const DELIVERY_QUEUE_CAPACITY: usize = 100;

pub struct Session {
    pub host: String,
    pub model: String,
    pub system: String,
    pub template: String,
    /// Token context returned by a previous generation.
    pub context: Option<Vec<i64>>,
    pub prompt: String,
    pub suffix: String,
    pub images: Vec<ImageData>,
    pub options: Options,

    id: ComponentId,
    transport: Arc<dyn Transport>,
    last_error: Option<SharedError>,
    is_generating: bool,
    response: String,
    cancel_token: Option<CancellationToken>,
    request_seq: u64,
    in_flight: Arc<Mutex<()>>,
    deliveries_tx: mpsc::Sender<Msg>,
    deliveries_rx: Option<mpsc::Receiver<Msg>>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    /// A session talking HTTP to the configured default host.
    pub fn new() -> Self {
        Self::with_transport(Arc::new(HttpTransport::new()))
    }

    pub fn with_transport(transport: Arc<dyn Transport>) -> Self {
        let defaults = config::defaults();
        let (deliveries_tx, deliveries_rx) = mpsc::channel(DELIVERY_QUEUE_CAPACITY);
        Self {
            host: defaults.host.clone(),
            model: defaults.model.clone(),
            system: config::default_system(),
            template: String::new(),
            context: None,
            prompt: defaults.prompt.clone(),
            suffix: String::new(),
            images: Vec::new(),
            options: Options::new(),
            id: ComponentId::next(),
            transport,
            last_error: None,
            is_generating: false,
            response: String::new(),
            cancel_token: None,
            request_seq: 0,
            in_flight: Arc::new(Mutex::new(())),
            deliveries_tx,
            deliveries_rx: Some(deliveries_rx),
        }
    }

    pub fn id(&self) -> ComponentId {
        self.id
    }

    pub fn transport(&self) -> Arc<dyn Transport> {
        self.transport.clone()
    }

    pub fn is_generating(&self) -> bool {
        self.is_generating
    }

    /// Text accumulated so far for the current or last generation.
    pub fn response(&self) -> &str {
        &self.response
    }

    pub fn error(&self) -> Option<&SharedError> {
        self.last_error.as_ref()
    }

    pub fn clear_response(&mut self) {
        self.response.clear();
    }

    pub fn clear_error(&mut self) {
        self.last_error = None;
    }

    pub fn start_generate_msg(&self) -> Msg {
        Msg::StartGenerate { id: self.id }
    }

    pub fn stop_generate_msg(&self) -> Msg {
        Msg::StopGenerate { id: self.id }
    }

    /// What the session shows when rendered on its own.
    pub fn view(&self) -> String {
        match &self.last_error {
            Some(err) => format!("ERROR: {err}"),
            None => self.response.clone(),
        }
    }

    pub fn update(&mut self, msg: &Msg) -> Command {
        match msg {
            Msg::StartGenerate { id } if *id == self.id => self.start(),
            Msg::StopGenerate { id } if *id == self.id => {
                self.cancel_active();
                Command::None
            }
            Msg::GenerateChunk { id, request, chunk } if self.is_current(*id, *request) => {
                self.apply_chunk(chunk)
            }
            Msg::GenerateFailed { id, request, error } if self.is_current(*id, *request) => {
                self.fail(error.clone())
            }
            _ => Command::None,
        }
    }

    fn is_current(&self, id: ComponentId, request: u64) -> bool {
        id == self.id && request == self.request_seq && self.is_generating
    }

    fn start(&mut self) -> Command {
        if self.is_generating {
            debug!(session = %self.id, request = self.request_seq, "superseding active generation");
            self.cancel_active();
        }

        self.request_seq += 1;
        self.last_error = None;
        self.response.clear();

        let host = match parse_host(&self.host) {
            Ok(host) => host,
            Err(err) => return self.fail(err.shared()),
        };

        let cancel_token = CancellationToken::new();
        self.cancel_token = Some(cancel_token.clone());
        self.is_generating = true;
        debug!(
            session = %self.id,
            request = self.request_seq,
            model = %self.model,
            "starting generation"
        );

        Command::Generate(GenerateJob {
            session_id: self.id,
            request: self.request_seq,
            host,
            body: self.build_request(),
            transport: self.transport.clone(),
            cancel_token,
            in_flight: self.in_flight.clone(),
            deliveries: self.deliveries_tx.clone(),
        })
    }

    fn build_request(&self) -> GenerateRequest {
        GenerateRequest {
            model: self.model.clone(),
            prompt: self.prompt.clone(),
            suffix: self.suffix.clone(),
            system: self.system.clone(),
            template: self.template.clone(),
            context: self.context.clone(),
            stream: true,
            images: self.images.clone(),
            options: self.options.clone(),
        }
    }

    fn cancel_active(&mut self) {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }
        self.is_generating = false;
    }

    fn apply_chunk(&mut self, chunk: &GenerateResponse) -> Command {
        let created_at = chunk.created_at.unwrap_or_else(Utc::now);
        self.response.push_str(&chunk.response);

        let partial = Command::Emit(Msg::GenerateResponse {
            id: self.id,
            created_at,
            response: chunk.response.clone(),
        });
        if !chunk.done {
            return partial;
        }

        self.is_generating = false;
        self.cancel_token = None;
        debug!(
            session = %self.id,
            request = self.request_seq,
            chars = self.response.len(),
            "generation finished"
        );

        Command::Batch(vec![
            partial,
            Command::Emit(Msg::GenerateDone {
                id: self.id,
                created_at,
                response: self.response.clone(),
                done_reason: chunk.done_reason.clone().unwrap_or_default(),
                context: chunk.context.clone(),
            }),
        ])
    }

    fn fail(&mut self, error: SharedError) -> Command {
        debug!(session = %self.id, request = self.request_seq, error = %error, "generation failed");
        self.is_generating = false;
        self.cancel_token = None;
        let done_reason = error.to_string();
        self.last_error = Some(error);

        Command::Emit(Msg::GenerateDone {
            id: self.id,
            created_at: Utc::now(),
            response: String::new(),
            done_reason,
            context: None,
        })
    }
}

impl Component for Session {
    /// Hands the delivery queue to the runtime. Only the first call does
    /// anything.
    fn init(&mut self) -> Command {
        match self.deliveries_rx.take() {
            Some(rx) => Command::Listen(rx),
            None => Command::None,
        }
    }

    fn update(&mut self, msg: &Msg) -> Command {
        Session::update(self, msg)
    }

    fn render(&self, frame: &mut Frame, area: Rect) {
        let paragraph = Paragraph::new(self.view()).wrap(Wrap { trim: false });
        frame.render_widget(paragraph, area);
    }
}

/// Background half of a generation: streams one request into the owning
/// session's delivery queue.
pub struct GenerateJob {
    session_id: ComponentId,
    request: u64,
    host: Url,
    body: GenerateRequest,
    transport: Arc<dyn Transport>,
    cancel_token: CancellationToken,
    in_flight: Arc<Mutex<()>>,
    deliveries: mpsc::Sender<Msg>,
}

impl GenerateJob {
    pub fn session_id(&self) -> ComponentId {
        self.session_id
    }

    pub async fn run(self) {
        let GenerateJob {
            session_id,
            request,
            host,
            body,
            transport,
            cancel_token,
            in_flight,
            deliveries,
        } = self;

        tokio::select! {
            biased;
            _ = cancel_token.cancelled() => {
                debug!(session = %session_id, request, "generation cancelled");
            }
            _ = async {
                // A superseded worker holds this until its stream is dropped.
                let _slot = in_flight.lock().await;
                let outcome = stream_generation(
                    transport.as_ref(),
                    &host,
                    &body,
                    session_id,
                    request,
                    &deliveries,
                )
                .await;
                if let Err(err) = outcome {
                    let _ = deliveries
                        .send(Msg::GenerateFailed {
                            id: session_id,
                            request,
                            error: err.shared(),
                        })
                        .await;
                }
            } => {}
        }
    }
}

async fn stream_generation(
    transport: &dyn Transport,
    host: &Url,
    body: &GenerateRequest,
    id: ComponentId,
    request: u64,
    deliveries: &mpsc::Sender<Msg>,
) -> Result<(), ApiError> {
    let mut stream = transport.generate(host, body).await?;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        let done = chunk.done;
        if deliveries
            .send(Msg::GenerateChunk { id, request, chunk })
            .await
            .is_err()
        {
            // The session is gone; nobody is listening.
            return Ok(());
        }
        if done {
            return Ok(());
        }
    }
    Err(ApiError::IncompleteStream)
}
