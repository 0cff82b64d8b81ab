use super::decode::Utf8ChunkDecoder;
use super::framing::OutputLines;
use super::ForwardError;
use crate::config::ExecutorConfig;
use crate::dispatch::{ExecutionRequest, ExecutorEndpoint};
use crate::util::truncate_with_ellipsis;
use anyhow::{Context as _, Result};
use futures_util::stream::{self, BoxStream, Stream, StreamExt};
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::time::error::Elapsed;
use tokio_util::sync::{CancellationToken, DropGuard};
use uuid::Uuid;

/// Frames buffered between the relay task and the client writer.
pub const FRAME_BUFFER: usize = 32;

/// Longest error text written to the log for one failed session.
const LOG_ERROR_CHARS: usize = 300;

/// One unit of the client-facing stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// One non-blank line of executor output, with any SSE framing removed.
    Output(String),
    /// The executor closed its response normally.
    Done,
    /// The session failed; nothing follows.
    Error(ForwardError),
}

impl Frame {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Output(_))
    }
}

/// Opens one executor request per session and relays its output.
///
/// Dispatch is at-most-once: a failed or interrupted request is reported,
/// never retried.
#[derive(Debug, Clone)]
pub struct Forwarder {
    client: reqwest::Client,
    base_url: String,
    idle_timeout: Option<Duration>,
}

impl Forwarder {
    pub fn new(config: &ExecutorConfig) -> Result<Self> {
        // No request timeout: tools may legitimately run for a long time.
        // Idle connections are not pooled so every session gets its own socket.
        let mut builder = reqwest::Client::builder().pool_max_idle_per_host(0);
        if let Some(connect_timeout) = config.connect_timeout() {
            builder = builder.connect_timeout(connect_timeout);
        }
        let client = builder
            .build()
            .context("Failed to build executor HTTP client")?;
        Ok(Self::with_client(
            client,
            &config.base_url,
            config.idle_timeout(),
        ))
    }

    pub fn with_client(
        client: reqwest::Client,
        base_url: &str,
        idle_timeout: Option<Duration>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.trim().trim_end_matches('/').to_string(),
            idle_timeout,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn endpoint_url(&self, endpoint: ExecutorEndpoint) -> String {
        format!("{}/{}", self.base_url, endpoint.path())
    }

    /// Start a session and return its frames.
    ///
    /// The relay runs on its own task. Dropping the returned stream cancels
    /// it and closes the executor connection.
    pub fn forward(
        &self,
        endpoint: ExecutorEndpoint,
        request: ExecutionRequest,
    ) -> FrameStream {
        let (tx, rx) = mpsc::channel(FRAME_BUFFER);
        let token = CancellationToken::new();
        let relay = Relay {
            client: self.client.clone(),
            url: self.endpoint_url(endpoint),
            idle_timeout: self.idle_timeout,
            session: Uuid::new_v4(),
        };
        tokio::spawn(relay.run(request, tx, token.clone()));
        FrameStream::new(rx, token.drop_guard())
    }
}

/// Frames of one session, ending with exactly one terminal frame.
///
/// Holds the session's cancellation guard: dropping the stream stops the relay.
pub struct FrameStream {
    inner: BoxStream<'static, Frame>,
}

impl FrameStream {
    fn new(rx: mpsc::Receiver<Frame>, guard: DropGuard) -> Self {
        let inner = stream::unfold(Some((rx, guard)), |state| async move {
            let Some((mut rx, guard)) = state else {
                return None;
            };
            match rx.recv().await {
                Some(frame) if frame.is_terminal() => Some((frame, None)),
                Some(frame) => Some((frame, Some((rx, guard)))),
                // Relay task died without reporting (panic); still close the stream properly.
                None => Some((
                    Frame::Error(ForwardError::StreamInterrupted(
                        "executor relay ended without a final status".into(),
                    )),
                    None,
                )),
            }
        })
        .boxed();
        Self { inner }
    }
}

impl Stream for FrameStream {
    type Item = Frame;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Frame>> {
        self.inner.poll_next_unpin(cx)
    }
}

struct Relay {
    client: reqwest::Client,
    url: String,
    idle_timeout: Option<Duration>,
    session: Uuid,
}

impl Relay {
    async fn run(
        self,
        request: ExecutionRequest,
        tx: mpsc::Sender<Frame>,
        token: CancellationToken,
    ) {
        let started = Instant::now();
        let mut frames = 0usize;
        tracing::info!(session = %self.session, url = %self.url, "executor stream opened");

        let terminal = tokio::select! {
            biased;
            () = token.cancelled() => None,
            terminal = self.relay(&request, &tx, &mut frames) => terminal,
        };

        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        match terminal {
            Some(frame) => {
                if let Frame::Error(err) = &frame {
                    tracing::warn!(
                        session = %self.session,
                        kind = err.kind(),
                        frames,
                        elapsed_ms,
                        "executor stream failed: {}",
                        truncate_with_ellipsis(&err.to_string(), LOG_ERROR_CHARS)
                    );
                } else {
                    tracing::info!(
                        session = %self.session,
                        frames,
                        elapsed_ms,
                        "executor stream completed"
                    );
                }
                let _ = tx.send(frame).await;
            }
            None => {
                tracing::info!(
                    session = %self.session,
                    frames,
                    elapsed_ms,
                    "client went away; executor stream cancelled"
                );
            }
        }
    }

    /// Returns the terminal frame, or `None` if the client stopped listening.
    async fn relay(
        &self,
        request: &ExecutionRequest,
        tx: &mpsc::Sender<Frame>,
        frames: &mut usize,
    ) -> Option<Frame> {
        let response = match self.client.post(&self.url).json(request).send().await {
            Ok(response) => response,
            Err(err) => return Some(Frame::Error(ForwardError::from_send_error(&err))),
        };

        let status = response.status();
        if !status.is_success() {
            let body = match within(self.idle_timeout, response.text()).await {
                Ok(Ok(body)) => body.trim_end().to_string(),
                Ok(Err(err)) => format!("(error body unreadable: {err})"),
                Err(_) => "(error body not received)".to_string(),
            };
            return Some(Frame::Error(ForwardError::ExecutorError {
                status: status.as_u16(),
                body,
            }));
        }

        let chunks = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|err| ForwardError::from_body_error(&err)));
        relay_chunks(chunks, self.idle_timeout, tx, frames).await
    }
}

async fn within<F: Future>(limit: Option<Duration>, fut: F) -> Result<F::Output, Elapsed> {
    match limit {
        Some(limit) => tokio::time::timeout(limit, fut).await,
        None => Ok(fut.await),
    }
}

/// Relay executor chunks into `tx`, one frame per output line, until the
/// body ends.
///
/// Blank lines are dropped and an unterminated last line is flushed before
/// the terminal frame. Returns the terminal frame, or `None` once the
/// receiver is gone.
pub(crate) async fn relay_chunks<S, B>(
    chunks: S,
    idle_timeout: Option<Duration>,
    tx: &mpsc::Sender<Frame>,
    frames: &mut usize,
) -> Option<Frame>
where
    S: Stream<Item = Result<B, ForwardError>>,
    B: AsRef<[u8]>,
{
    let mut chunks = std::pin::pin!(chunks);
    let mut decoder = Utf8ChunkDecoder::new();
    let mut lines = OutputLines::new();

    let terminal = loop {
        let next = match within(idle_timeout, chunks.next()).await {
            Ok(next) => next,
            Err(_) => {
                let secs = idle_timeout.map_or(0, |limit| limit.as_secs());
                break Frame::Error(ForwardError::ExecutorIdle { secs });
            }
        };

        match next {
            Some(Ok(bytes)) => {
                let text = decoder.decode(bytes.as_ref());
                if !emit_all(tx, lines.push(&text), frames).await {
                    return None;
                }
            }
            Some(Err(err)) => break Frame::Error(err),
            None => {
                if let Some(rest) = decoder.finish() {
                    if !emit_all(tx, lines.push(&rest), frames).await {
                        return None;
                    }
                }
                break Frame::Done;
            }
        }
    };

    if !emit_all(tx, lines.finish(), frames).await {
        return None;
    }
    Some(terminal)
}

async fn emit_all<I>(tx: &mpsc::Sender<Frame>, lines: I, frames: &mut usize) -> bool
where
    I: IntoIterator<Item = String>,
{
    for line in lines {
        *frames += 1;
        tracing::trace!(bytes = line.len(), "relaying executor output");
        if tx.send(Frame::Output(line)).await.is_err() {
            return false;
        }
    }
    true
}
