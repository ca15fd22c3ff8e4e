use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use ratatui::backend::TestBackend;
use ratatui::Terminal;
use futures_util::stream::{self, StreamExt};
use reqwest::Url;
use tokio::sync::mpsc;

use crate::api::{
    ApiError, EmbedRequest, EmbedResponse, GenerateRequest, GenerateResponse, GenerateStream,
    ListModelResponse, ListResponse, ModelDetails, Transport,
};
use crate::core::command::{execute, Command, Dispatcher, Flow};
use crate::core::component::Component;
use crate::core::message::Msg;

/// How one `generate` call on [`FakeTransport`] behaves.
#[derive(Debug, Clone, Default)]
pub struct GenerateScript {
    pub chunks: Vec<String>,
    /// Never finish after the chunks; the call stays open until dropped.
    pub stall: bool,
    pub error: Option<String>,
    pub chunk_delay: Duration,
}

impl GenerateScript {
    pub fn chunks(chunks: &[&str]) -> Self {
        Self {
            chunks: chunks.iter().map(|c| c.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn stalled(chunks: &[&str]) -> Self {
        Self {
            stall: true,
            ..Self::chunks(chunks)
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            error: Some(message.to_string()),
            ..Self::default()
        }
    }
}

/// Scripted behaviour for one `embed` call.
#[derive(Debug, Clone, Default)]
pub struct EmbedScript {
    pub embeddings: Vec<Vec<f32>>,
    pub delay: Duration,
    pub error: Option<String>,
}

/// Tracks how many calls are open at once.
#[derive(Debug, Default)]
struct Concurrency {
    active: AtomicUsize,
    max_active: AtomicUsize,
    calls: AtomicUsize,
}

struct ActiveGuard(Arc<Concurrency>);

impl ActiveGuard {
    fn enter(counter: &Arc<Concurrency>) -> Self {
        counter.calls.fetch_add(1, Ordering::SeqCst);
        let now = counter.active.fetch_add(1, Ordering::SeqCst) + 1;
        counter.max_active.fetch_max(now, Ordering::SeqCst);
        ActiveGuard(counter.clone())
    }
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.0.active.fetch_sub(1, Ordering::SeqCst);
    }
}

/// In-memory [`Transport`] with scripted replies and call accounting.
#[derive(Default)]
pub struct FakeTransport {
    models: Mutex<Vec<ListModelResponse>>,
    list_error: Mutex<Option<String>>,
    list_delay: Mutex<Duration>,
    generate_scripts: Mutex<VecDeque<GenerateScript>>,
    embed_scripts: Mutex<VecDeque<EmbedScript>>,
    generate_requests: Mutex<Vec<GenerateRequest>>,
    embed_requests: Mutex<Vec<EmbedRequest>>,
    generate_calls: Arc<Concurrency>,
    embed_calls: Arc<Concurrency>,
}

impl FakeTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_models(models: Vec<ListModelResponse>) -> Arc<Self> {
        let fake = Self::default();
        fake.set_models(models);
        Arc::new(fake)
    }

    pub fn set_models(&self, models: Vec<ListModelResponse>) {
        *self.models.lock().unwrap() = models;
        *self.list_error.lock().unwrap() = None;
    }

    pub fn fail_listing(&self, message: &str) {
        *self.list_error.lock().unwrap() = Some(message.to_string());
    }

    pub fn set_list_delay(&self, delay: Duration) {
        *self.list_delay.lock().unwrap() = delay;
    }

    pub fn push_generate(&self, script: GenerateScript) {
        self.generate_scripts.lock().unwrap().push_back(script);
    }

    pub fn push_embed(&self, script: EmbedScript) {
        self.embed_scripts.lock().unwrap().push_back(script);
    }

    pub fn generate_requests(&self) -> Vec<GenerateRequest> {
        self.generate_requests.lock().unwrap().clone()
    }

    pub fn embed_requests(&self) -> Vec<EmbedRequest> {
        self.embed_requests.lock().unwrap().clone()
    }

    pub fn generate_calls(&self) -> usize {
        self.generate_calls.calls.load(Ordering::SeqCst)
    }

    pub fn generate_active(&self) -> usize {
        self.generate_calls.active.load(Ordering::SeqCst)
    }

    pub fn generate_max_active(&self) -> usize {
        self.generate_calls.max_active.load(Ordering::SeqCst)
    }

    pub fn embed_calls(&self) -> usize {
        self.embed_calls.calls.load(Ordering::SeqCst)
    }

    pub fn embed_max_active(&self) -> usize {
        self.embed_calls.max_active.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn list_models(&self, _host: &Url) -> Result<ListResponse, ApiError> {
        let delay = *self.list_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if let Some(message) = self.list_error.lock().unwrap().clone() {
            return Err(ApiError::Server(message));
        }
        Ok(ListResponse {
            models: self.models.lock().unwrap().clone(),
        })
    }

    async fn generate(
        &self,
        _host: &Url,
        request: &GenerateRequest,
    ) -> Result<GenerateStream, ApiError> {
        let guard = ActiveGuard::enter(&self.generate_calls);
        self.generate_requests.lock().unwrap().push(request.clone());

        let script = self
            .generate_scripts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| GenerateScript::chunks(&["ok"]));
        if let Some(message) = script.error {
            return Err(ApiError::Server(message));
        }

        let last = script.chunks.len().saturating_sub(1);
        let stall = script.stall;
        let delay = script.chunk_delay;
        let items: Vec<GenerateResponse> = script
            .chunks
            .into_iter()
            .enumerate()
            .map(|(index, text)| {
                let done = !stall && index == last;
                GenerateResponse {
                    model: request.model.clone(),
                    response: text,
                    done,
                    done_reason: done.then(|| "stop".to_string()),
                    context: done.then(|| vec![1, 2, 3]),
                    ..GenerateResponse::default()
                }
            })
            .collect();

        let body = stream::iter(items).then(move |item| async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            Ok::<_, ApiError>(item)
        });
        let tail = stream::once(async move {
            if stall {
                std::future::pending::<()>().await;
            }
            drop(guard);
            None
        })
        .filter_map(|item: Option<Result<GenerateResponse, ApiError>>| async move { item });

        Ok(body.chain(tail).boxed())
    }

    async fn embed(&self, _host: &Url, request: &EmbedRequest) -> Result<EmbedResponse, ApiError> {
        let _guard = ActiveGuard::enter(&self.embed_calls);
        self.embed_requests.lock().unwrap().push(request.clone());

        let script = self
            .embed_scripts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_default();
        if !script.delay.is_zero() {
            tokio::time::sleep(script.delay).await;
        }
        match script.error {
            Some(message) => Err(ApiError::Server(message)),
            None => Ok(EmbedResponse {
                model: request.model.clone(),
                embeddings: script.embeddings,
                ..EmbedResponse::default()
            }),
        }
    }
}

pub fn model_entry(name: &str, digest: &str) -> ListModelResponse {
    ListModelResponse {
        name: name.to_string(),
        model: name.to_string(),
        size: 2_019_393_189,
        digest: digest.to_string(),
        details: ModelDetails {
            family: "llama".to_string(),
            parameter_size: "3.2B".to_string(),
            quantization_level: "Q4_K_M".to_string(),
            ..ModelDetails::default()
        },
        ..ListModelResponse::default()
    }
}

/// A minimal event loop for driving components in tests.
pub struct Harness {
    pub dispatcher: Dispatcher,
    rx: mpsc::UnboundedReceiver<Msg>,
}

impl Harness {
    pub fn new() -> Self {
        let (dispatcher, rx) = Dispatcher::new();
        Self { dispatcher, rx }
    }

    pub fn run(&self, command: Command) -> Flow {
        execute(command, &self.dispatcher)
    }

    pub async fn next(&mut self) -> Msg {
        tokio::time::timeout(Duration::from_secs(5), self.rx.recv())
            .await
            .expect("timed out waiting for a message")
            .expect("dispatcher closed")
    }

    /// The next message if one arrives within `wait`.
    pub async fn next_within(&mut self, wait: Duration) -> Option<Msg> {
        tokio::time::timeout(wait, self.rx.recv()).await.ok().flatten()
    }

    /// Feed messages to `component` until one satisfies `until`, returning
    /// every message seen, including the last.
    pub async fn drive<C, F>(&mut self, component: &mut C, until: F) -> Vec<Msg>
    where
        C: Component,
        F: Fn(&Msg) -> bool,
    {
        let mut seen = Vec::new();
        loop {
            let msg = self.next().await;
            let command = component.update(&msg);
            self.run(command);
            let done = until(&msg);
            seen.push(msg);
            if done {
                return seen;
            }
        }
    }
}

pub async fn wait_until<F: Fn() -> bool>(condition: F) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

/// Render `component` into an in-memory terminal and return its rows joined
/// by newlines.
pub fn render_to_string<C: Component>(component: &C, width: u16, height: u16) -> String {
    let mut terminal = Terminal::new(TestBackend::new(width, height)).expect("test terminal");
    terminal
        .draw(|frame| {
            let area = frame.area();
            component.render(frame, area);
        })
        .expect("draw");
    let buffer = terminal.backend().buffer();
    (0..height)
        .map(|y| {
            (0..width)
                .map(|x| buffer[(x, y)].symbol())
                .collect::<String>()
        })
        .collect::<Vec<_>>()
        .join("\n")
}
