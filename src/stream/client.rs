//! Stream connection lifecycle.
//!
//! `TwitterStreamClient` owns the one active connection. `connect` builds
//! the signed filter request and hands the established response to a
//! background worker that owns the body stream, the frame decoder, and the
//! liveness watchdog for the lifetime of that connection. A stall forces an
//! immediate reconnect inside the worker; a transport failure is fatal for
//! the attempt and is surfaced to subscribers instead of being retried.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::header::AUTHORIZATION;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::auth::{percent_encode, OAuth1Signer, RequestSigner, SigningError};
use crate::config::StreamConfig;
use crate::stream::decoder::FrameDecoder;
use crate::stream::events::{EventPublisher, StreamEvent};
use crate::stream::proto::StreamRecord;
use crate::stream::watchdog::LivenessWatchdog;

const TCP_KEEPALIVE: Duration = Duration::from_secs(60);

/// Connection lifecycle states.
///
/// Transitions are the only place the transport handle is created or
/// destroyed; at most one connection exists at a time.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ConnectionState {
    /// No connection and no worker.
    Idle,
    /// Request establishment in flight.
    Connecting,
    /// Response established, records flowing.
    Streaming,
    /// Teardown in progress.
    TearingDown,
}

/// Errors produced by connection establishment and transport handling.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Request or body stream failure.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The request could not be signed.
    #[error("request signing failed: {0}")]
    Signing(#[from] SigningError),

    /// The configured proxy address was rejected.
    #[error("proxy address rejected: {0}")]
    Proxy(#[source] reqwest::Error),
}

/// Client for one realtime filter-stream connection.
pub struct TwitterStreamClient {
    config: Arc<StreamConfig>,
    signer: Arc<dyn RequestSigner>,
    http: reqwest::Client,
    publisher: EventPublisher,
    state: Arc<Mutex<ConnectionState>>,
    missed_total: Arc<AtomicU64>,
    worker: Option<WorkerHandle>,
}

struct WorkerHandle {
    shutdown_tx: oneshot::Sender<()>,
    join: JoinHandle<()>,
}

impl TwitterStreamClient {
    /// Creates a client signing requests with OAuth 1.0a per the config.
    pub fn new(config: StreamConfig) -> Result<Self, ClientError> {
        let signer = Arc::new(OAuth1Signer::from_config(&config));
        Self::with_signer(config, signer)
    }

    /// Creates a client with an explicit signer.
    pub fn with_signer(
        config: StreamConfig,
        signer: Arc<dyn RequestSigner>,
    ) -> Result<Self, ClientError> {
        let mut builder = reqwest::Client::builder().tcp_keepalive(Some(TCP_KEEPALIVE));
        builder = match &config.proxy {
            Some(proxy) => {
                let proxy_url = format!("http://{}:{}", proxy.host, proxy.port);
                builder.proxy(reqwest::Proxy::all(&proxy_url).map_err(ClientError::Proxy)?)
            }
            None => builder.no_proxy(),
        };
        let http = builder.build()?;

        Ok(Self {
            config: Arc::new(config),
            signer,
            http,
            publisher: EventPublisher::new(),
            state: Arc::new(Mutex::new(ConnectionState::Idle)),
            missed_total: Arc::new(AtomicU64::new(0)),
            worker: None,
        })
    }

    /// Registers a subscriber for stream events.
    ///
    /// Subscribers are expected to register before `connect`.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<StreamEvent> {
        self.publisher.subscribe()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        self.state
            .lock()
            .map(|guard| *guard)
            .unwrap_or(ConnectionState::Idle)
    }

    /// Establishes the stream connection and starts the worker.
    ///
    /// A no-op while a connection is already being established or streaming.
    /// Establishment failure emits [`StreamEvent::TwitterError`] and returns
    /// the error; there is no automatic retry.
    pub async fn connect(&mut self) -> Result<(), ClientError> {
        if !self.try_begin_connect() {
            debug!(event = "stream_connect_ignored", state = ?self.state());
            return Ok(());
        }
        debug!(
            event = "stream_connect",
            host = %self.config.host,
            port = self.config.port,
            proxied = self.config.proxy.is_some(),
        );

        match establish(&self.config, self.signer.as_ref(), &self.http).await {
            Ok(response) => {
                set_state(&self.state, ConnectionState::Streaming);
                info!(event = "stream_connected");
                self.publisher.publish(StreamEvent::Connected);

                let (shutdown_tx, shutdown_rx) = oneshot::channel();
                let context = WorkerContext {
                    config: Arc::clone(&self.config),
                    signer: Arc::clone(&self.signer),
                    http: self.http.clone(),
                    publisher: self.publisher.clone(),
                    state: Arc::clone(&self.state),
                    missed_total: Arc::clone(&self.missed_total),
                };
                let join = tokio::spawn(connection_worker(context, response, shutdown_rx));
                self.worker = Some(WorkerHandle { shutdown_tx, join });
                Ok(())
            }
            Err(error) => {
                set_state(&self.state, ConnectionState::Idle);
                warn!(event = "stream_connect_failed", error = %error);
                self.publisher.publish(StreamEvent::TwitterError {
                    message: error.to_string(),
                });
                Err(error)
            }
        }
    }

    /// Tears down the active connection, if any.
    ///
    /// Stops the watchdog, aborts the in-flight response, and emits
    /// [`StreamEvent::Disconnected`]. Safe to call from any state and
    /// idempotent; repeated calls emit nothing further.
    pub async fn disconnect(&mut self) {
        let Some(worker) = self.worker.take() else {
            debug!(event = "stream_disconnect_ignored");
            return;
        };
        set_state(&self.state, ConnectionState::TearingDown);
        let _ = worker.shutdown_tx.send(());
        let _ = worker.join.await;
        set_state(&self.state, ConnectionState::Idle);
    }

    fn try_begin_connect(&self) -> bool {
        match self.state.lock() {
            Ok(mut state) if *state == ConnectionState::Idle => {
                *state = ConnectionState::Connecting;
                true
            }
            _ => false,
        }
    }
}

// Dropping the client drops the shutdown sender, which the worker observes
// and treats as a disconnect.

struct WorkerContext {
    config: Arc<StreamConfig>,
    signer: Arc<dyn RequestSigner>,
    http: reqwest::Client,
    publisher: EventPublisher,
    state: Arc<Mutex<ConnectionState>>,
    missed_total: Arc<AtomicU64>,
}

enum SessionOutcome {
    Shutdown,
    Stalled,
    Failed(ClientError),
}

async fn connection_worker(
    context: WorkerContext,
    first_response: reqwest::Response,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    let mut response = Some(first_response);
    loop {
        let current = match response.take() {
            Some(response) => response,
            // Forced reconnect after a stall.
            None => {
                let established = tokio::select! {
                    _ = &mut shutdown_rx => None,
                    result = establish(&context.config, context.signer.as_ref(), &context.http) => {
                        Some(result)
                    }
                };
                // The stall branch already emitted Disconnected for the old
                // connection, so these exits must not emit it again.
                match established {
                    Some(Ok(response)) => {
                        set_state(&context.state, ConnectionState::Streaming);
                        info!(event = "stream_connected");
                        context.publisher.publish(StreamEvent::Connected);
                        response
                    }
                    Some(Err(error)) => {
                        warn!(event = "stream_reconnect_failed", error = %error);
                        context.publisher.publish(StreamEvent::TwitterError {
                            message: error.to_string(),
                        });
                        set_state(&context.state, ConnectionState::Idle);
                        return;
                    }
                    None => {
                        set_state(&context.state, ConnectionState::Idle);
                        return;
                    }
                }
            }
        };

        match run_streaming_session(&context, current, &mut shutdown_rx).await {
            SessionOutcome::Shutdown => {
                finish_worker(&context);
                return;
            }
            SessionOutcome::Stalled => {
                error!(
                    event = "stream_stalled",
                    timeout_ms = context.config.keep_alive.as_millis() as u64,
                );
                context.publisher.publish(StreamEvent::TwitterDown);
                set_state(&context.state, ConnectionState::TearingDown);
                context.publisher.publish(StreamEvent::Disconnected);
                set_state(&context.state, ConnectionState::Connecting);
            }
            SessionOutcome::Failed(error) => {
                warn!(event = "stream_transport_failed", error = %error);
                context.publisher.publish(StreamEvent::TwitterError {
                    message: error.to_string(),
                });
                finish_worker(&context);
                return;
            }
        }
    }
}

fn finish_worker(context: &WorkerContext) {
    set_state(&context.state, ConnectionState::Idle);
    info!(event = "stream_disconnected");
    context.publisher.publish(StreamEvent::Disconnected);
}

async fn run_streaming_session(
    context: &WorkerContext,
    response: reqwest::Response,
    shutdown_rx: &mut oneshot::Receiver<()>,
) -> SessionOutcome {
    let mut decoder = FrameDecoder::new();
    let (mut watchdog, mut stall_rx) = LivenessWatchdog::new(context.config.keep_alive);
    watchdog.arm();

    let mut body = response.bytes_stream();
    let mut body_done = false;

    loop {
        tokio::select! {
            _ = &mut *shutdown_rx => return SessionOutcome::Shutdown,
            Some(()) = stall_rx.recv() => return SessionOutcome::Stalled,
            chunk = body.next(), if !body_done => match chunk {
                Some(Ok(bytes)) => {
                    // Silence is measured on raw bytes, so the reset happens
                    // before any record work for the chunk.
                    watchdog.reset();
                    for record in decoder.feed(&bytes) {
                        dispatch_record(context, record);
                    }
                }
                Some(Err(error)) => return SessionOutcome::Failed(error.into()),
                None => {
                    // End of body is not a failure by itself; the watchdog
                    // decides when the silence becomes a stall.
                    debug!(event = "stream_body_ended");
                    body_done = true;
                }
            },
        }
    }
}

fn dispatch_record(context: &WorkerContext, record: StreamRecord) {
    match record {
        StreamRecord::Tweet(tweet) => {
            context.publisher.publish(StreamEvent::NewTweet(tweet));
        }
        StreamRecord::TrackLimit { track } => {
            let previous = context.missed_total.load(Ordering::Relaxed);
            let missed = track.saturating_sub(previous);
            context.missed_total.store(track, Ordering::Relaxed);
            context.publisher.publish(StreamEvent::MissedTweets { missed });
        }
        StreamRecord::Unclassified(value) => {
            debug!(event = "record_unclassified", record = %value);
        }
    }
}

async fn establish(
    config: &StreamConfig,
    signer: &dyn RequestSigner,
    http: &reqwest::Client,
) -> Result<reqwest::Response, ClientError> {
    let url = request_url(config);
    let authorization = signer.authorization_header("GET", &url)?;
    let response = http
        .get(&url)
        .header(AUTHORIZATION, authorization)
        .send()
        .await?;
    Ok(response.error_for_status()?)
}

fn request_path(config: &StreamConfig) -> String {
    format!("{}={}", config.track_request, percent_encode(&config.keywords))
}

fn request_url(config: &StreamConfig) -> String {
    format!(
        "{}://{}:{}{}",
        config.scheme(),
        config.host,
        config.port,
        request_path(config),
    )
}

fn set_state(state: &Mutex<ConnectionState>, next: ConnectionState) {
    if let Ok(mut guard) = state.lock() {
        *guard = next;
    }
}
