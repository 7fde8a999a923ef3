//! Realtime channel
//!
//! One supervisor task per `connect()` owns the socket. It walks a bounded
//! retry cycle, runs the read/write loop while connected, and starts a fresh
//! cycle when the server drops an established connection. Outbound frames
//! reach the socket through an unbounded mpsc channel that only exists while
//! connected.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::json;
use tantra_api::ApiClient;
use tantra_config::RealtimeConfig;
use tantra_core::{ConnectionStatus, DeliveryState, ErrorCategory, Message, Notifier};
use tantra_store::AppStore;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{header::AUTHORIZATION, HeaderValue};
use tokio_tungstenite::tungstenite::Message as Frame;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::error::{RealtimeError, RealtimeResult};
use crate::policy::ReconnectionPolicy;
use crate::protocol::{self, ClientEvent};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

const CONNECT_FAILED: &str = "Failed to connect to AGI System";
const LOAD_FAILED: &str = "Failed to load system data";

/// Result of [`RealtimeChannel::send`]
#[derive(Debug, Clone, PartialEq)]
pub enum SendOutcome {
    /// Pushed over the live connection; the reply arrives as a `message` event
    Pushed,
    /// Answered over HTTP
    Answered(Message),
    /// Both paths failed; the user message is marked failed
    Failed(String),
}

struct Supervisor {
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

struct Inner {
    url: String,
    policy: ReconnectionPolicy,
    store: AppStore,
    api: ApiClient,
    notifier: Arc<dyn Notifier>,
    supervisor: Mutex<Option<Supervisor>>,
    outbound: Mutex<Option<mpsc::UnboundedSender<String>>>,
    /// Bumped by every connect/disconnect; stale supervisors stop writing status
    generation: AtomicU64,
    attempts: AtomicU32,
}

impl Inner {
    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    fn set_status(&self, generation: u64, status: ConnectionStatus) {
        if self.is_current(generation) {
            self.store.set_connection_status(status);
        }
    }
}

/// Live connection to the backend event stream
#[derive(Clone)]
pub struct RealtimeChannel {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for RealtimeChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealtimeChannel")
            .field("url", &self.inner.url)
            .field("policy", &self.inner.policy)
            .field("connected", &self.is_connected())
            .finish()
    }
}

impl RealtimeChannel {
    pub fn new(
        url: impl Into<String>,
        policy: ReconnectionPolicy,
        store: AppStore,
        api: ApiClient,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                url: url.into(),
                policy,
                store,
                api,
                notifier,
                supervisor: Mutex::new(None),
                outbound: Mutex::new(None),
                generation: AtomicU64::new(0),
                attempts: AtomicU32::new(0),
            }),
        }
    }

    pub fn from_config(
        config: &RealtimeConfig,
        store: AppStore,
        api: ApiClient,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self::new(
            &config.url,
            ReconnectionPolicy::from_config(config),
            store,
            api,
            notifier,
        )
    }

    pub fn url(&self) -> &str {
        &self.inner.url
    }

    pub fn store(&self) -> &AppStore {
        &self.inner.store
    }

    pub fn is_connected(&self) -> bool {
        self.inner.outbound.lock().is_some()
            && self.inner.store.connection_status().is_connected()
    }

    /// Connection attempts made since this channel was created
    pub fn attempts(&self) -> u32 {
        self.inner.attempts.load(Ordering::SeqCst)
    }

    /// Start a connection cycle, replacing any running one
    ///
    /// Must be called from within a Tokio runtime.
    pub fn connect(&self) {
        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let cancel = CancellationToken::new();

        let previous = self.inner.supervisor.lock().take();
        if let Some(previous) = previous {
            previous.cancel.cancel();
        }
        *self.inner.outbound.lock() = None;
        self.inner.store.set_connection_status(ConnectionStatus::Connecting);

        let span = info_span!("realtime", url = %self.inner.url, generation);
        let handle = tokio::spawn(supervise(self.inner.clone(), cancel.clone(), generation).instrument(span));

        *self.inner.supervisor.lock() = Some(Supervisor {
            cancel,
            handle: Some(handle),
        });
    }

    /// Close the connection and stop retrying. Safe to call repeatedly.
    pub fn disconnect(&self) {
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
        let supervisor = self.inner.supervisor.lock().take();
        if let Some(supervisor) = supervisor {
            supervisor.cancel.cancel();
            debug!("Realtime channel disconnected");
        }
        *self.inner.outbound.lock() = None;
        self.inner.store.set_connection_status(ConnectionStatus::Disconnected);
    }

    pub fn reconnect(&self) {
        self.disconnect();
        self.connect();
    }

    /// Wait for the running supervisor to finish its cycle
    ///
    /// Returns immediately when nothing is running. A connected supervisor only
    /// finishes once retries are exhausted or the channel is disconnected.
    pub async fn wait(&self) {
        let handle = self
            .inner
            .supervisor
            .lock()
            .as_mut()
            .and_then(|s| s.handle.take());
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!("Realtime supervisor panicked: {}", e);
            }
        }
    }

    /// Optimistically append a user message and deliver it
    ///
    /// Goes over the socket when connected, otherwise over `POST /chat/message`.
    pub async fn send(&self, text: &str) -> SendOutcome {
        let inner = &self.inner;
        let message = Message::user(text);
        let id = message.id.clone();
        inner.store.add_message(message);

        if self.push(text) {
            inner.store.set_message_delivery(&id, DeliveryState::Sent);
            inner.store.set_typing(true);
            self.finish_send().await;
            return SendOutcome::Pushed;
        }

        match inner.api.send_message(text, None, None).await {
            Ok(response) => {
                inner.store.set_message_delivery(&id, DeliveryState::Delivered);
                let reply = Message::assistant(response.response, response.metadata);
                inner.store.add_message(reply.clone());
                self.finish_send().await;
                SendOutcome::Answered(reply)
            }
            Err(e) => {
                let reason = e.message();
                warn!("Failed to send message: {}", e);
                inner.store.set_message_delivery(&id, DeliveryState::Failed);
                inner.store.set_error(Some(reason.clone()));
                inner.store.log_error(
                    ErrorCategory::Message,
                    reason.clone(),
                    Some(json!({ "original_message": text, "error": e.to_string() })),
                );
                inner.notifier.error("Failed to send message");
                SendOutcome::Failed(reason)
            }
        }
    }

    fn push(&self, text: &str) -> bool {
        if !self.is_connected() {
            return false;
        }
        let frame = match (ClientEvent::Message {
            content: text.to_string(),
        })
        .to_text()
        {
            Ok(frame) => frame,
            Err(e) => {
                warn!("Failed to encode message frame: {}", e);
                return false;
            }
        };
        match self.inner.outbound.lock().as_ref() {
            Some(tx) => tx.send(frame).is_ok(),
            None => false,
        }
    }

    async fn finish_send(&self) {
        self.inner.store.save_current_session();
        if let Err(e) = self.inner.store.persist().await {
            warn!("Failed to persist store: {}", e);
        }
    }

    /// Fetch the four system snapshots concurrently
    pub async fn load_initial_state(&self) -> bool {
        let api = &self.inner.api;
        let store = &self.inner.store;
        match tokio::try_join!(
            api.system_status(),
            api.memory_stats(),
            api.learning_stats(),
            api.evolution_status(),
        ) {
            Ok((status, memory, learning, evolution)) => {
                store.set_system_status(status);
                store.set_memory_stats(memory);
                store.set_learning_stats(learning);
                store.set_evolution_status(evolution);
                true
            }
            Err(e) => {
                warn!("Error fetching initial data: {}", e);
                store.set_error(Some(LOAD_FAILED.to_string()));
                false
            }
        }
    }
}

async fn open(inner: &Inner) -> RealtimeResult<WsStream> {
    let mut request = inner.url.as_str().into_client_request()?;
    if let Some(token) = inner.api.token() {
        let value = HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|e| RealtimeError::Handshake(e.to_string()))?;
        request.headers_mut().insert(AUTHORIZATION, value);
    }
    let (stream, _response) = connect_async(request).await?;
    Ok(stream)
}

async fn supervise(inner: Arc<Inner>, cancel: CancellationToken, generation: u64) {
    let mut attempt: u32 = 0;

    loop {
        if cancel.is_cancelled() {
            return;
        }
        if !inner.policy.should_retry(attempt) {
            warn!("No connection attempts allowed (limit {})", inner.policy.max_attempts);
            inner.set_status(generation, ConnectionStatus::Disconnected);
            return;
        }
        attempt += 1;
        inner.attempts.fetch_add(1, Ordering::SeqCst);
        inner.set_status(generation, ConnectionStatus::Connecting);
        debug!("Connecting, attempt {}/{}", attempt, inner.policy.max_attempts);

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            result = open(&inner) => result,
        };

        match result {
            Ok(stream) => {
                attempt = 0;
                info!("Connected to {}", inner.url);
                run_connection(&inner, stream, &cancel, generation).await;
                if cancel.is_cancelled() || !inner.is_current(generation) {
                    return;
                }
                info!("Connection to {} closed by peer", inner.url);
                inner.set_status(generation, ConnectionStatus::Disconnected);
                inner.notifier.error("Disconnected from AGI System");
            }
            Err(e) => {
                warn!("Connection attempt {} failed: {}", attempt, e);
                if !inner.is_current(generation) {
                    return;
                }
                inner.set_status(generation, ConnectionStatus::Disconnected);
                inner.store.set_error(Some(CONNECT_FAILED.to_string()));
                inner.store.log_error(
                    ErrorCategory::Connection,
                    CONNECT_FAILED,
                    Some(json!({ "error": e.to_string(), "attempt": attempt })),
                );
                if !inner.policy.should_retry(attempt) {
                    warn!("Giving up after {} attempts", attempt);
                    inner.notifier.error("Connection failed");
                    return;
                }
            }
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(inner.policy.delay()) => {}
        }
    }
}

async fn run_connection(
    inner: &Inner,
    stream: WsStream,
    cancel: &CancellationToken,
    generation: u64,
) {
    let (mut sink, mut source) = stream.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();

    if !inner.is_current(generation) {
        return;
    }
    *inner.outbound.lock() = Some(tx);
    inner.set_status(generation, ConnectionStatus::Connected);
    inner.store.set_error(None);
    inner.notifier.success("Connected to AGI System");

    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                let _ = sink.send(Frame::Close(None)).await;
                break;
            }

            Some(text) = rx.recv() => {
                if let Err(e) = sink.send(Frame::Text(text)).await {
                    error!("Failed to send frame: {}", e);
                    break;
                }
            }

            frame = source.next() => {
                match frame {
                    Some(Ok(Frame::Text(text))) => {
                        protocol::dispatch_text(&text, &inner.store, inner.notifier.as_ref());
                    }
                    Some(Ok(Frame::Ping(data))) => {
                        if let Err(e) = sink.send(Frame::Pong(data)).await {
                            error!("Failed to send pong: {}", e);
                            break;
                        }
                    }
                    Some(Ok(Frame::Close(_))) | None => break,
                    Some(Err(e)) => {
                        warn!("Realtime socket error: {}", e);
                        break;
                    }
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    if inner.is_current(generation) {
        *inner.outbound.lock() = None;
    }
}
