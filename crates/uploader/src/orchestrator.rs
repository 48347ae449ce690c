//! Upload orchestrator.
//!
//! Drives one [`UploadSession`] to completion: slices pending chunks, sends
//! them one at a time in ascending index order, retries transient failures
//! with exponential backoff, and finally asks the backend to reassemble the
//! media. Cancellation is observed between attempts, never in the middle of
//! a transport call.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use roost_protocol::Artifact;
use roost_transfer::{Chunk, ChunkSource, SessionStore, TransferError, UploadSession};
use roost_upload_client::{TransportError, TransportFuture, UploadTransport};

use crate::config::UploadConfig;
use crate::error::UploadError;
use crate::types::UploadEvent;

/// Why a run stopped before producing an artifact.
enum Halt {
    Cancelled,
    Failed(TransportError),
    Local(TransferError),
}

impl From<TransferError> for Halt {
    fn from(e: TransferError) -> Self {
        Halt::Local(e)
    }
}

/// Limits of a single run.
struct RunContext {
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl RunContext {
    fn check_cancelled(&self) -> Result<(), Halt> {
        if self.cancel.is_cancelled() {
            Err(Halt::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Time left in the upload budget, if one is set.
    fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }
}

/// Orchestrates resumable chunked uploads over an [`UploadTransport`].
///
/// At most one `Uploader` may drive a given session at a time; the
/// `&mut UploadSession` borrow taken by [`run`](Self::run) enforces this
/// within a process.
pub struct Uploader<'a> {
    transport: &'a dyn UploadTransport,
    config: UploadConfig,
    store: Option<SessionStore>,
    events_tx: mpsc::Sender<UploadEvent>,
    events_rx: Option<mpsc::Receiver<UploadEvent>>,
    cancel: CancellationToken,
    /// Cancellation tokens of the runs in flight, by session id.
    runs: Mutex<HashMap<String, CancellationToken>>,
}

impl<'a> Uploader<'a> {
    /// Creates an uploader sending through `transport`.
    pub fn new(transport: &'a dyn UploadTransport, config: UploadConfig) -> Self {
        let (events_tx, events_rx) = mpsc::channel(256);
        Self {
            transport,
            config,
            store: None,
            events_tx,
            events_rx: Some(events_rx),
            cancel: CancellationToken::new(),
            runs: Mutex::new(HashMap::new()),
        }
    }

    /// Persists the session after every state change.
    ///
    /// Completed sessions are removed from the store.
    pub fn with_store(mut self, store: SessionStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Uses an externally owned shutdown token (e.g. wired to Ctrl-C).
    ///
    /// Every run derives its own token from it; see [`cancel_token`](Self::cancel_token).
    pub fn with_cancel_token(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Takes the event receiver. Can only be called once.
    pub fn take_events(&mut self) -> Option<mpsc::Receiver<UploadEvent>> {
        self.events_rx.take()
    }

    /// Returns the uploader's shutdown token.
    ///
    /// Cancelling it stops the run in flight and every later run of this
    /// uploader. Use [`cancel`](Self::cancel) or
    /// [`cancel_session`](Self::cancel_session) to stop a run and keep the
    /// uploader usable for resuming.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Cancels every run in flight; each stops before its next attempt.
    /// Later runs, including resumes of the cancelled sessions, start normally.
    pub fn cancel(&self) {
        for token in self.active_runs().values() {
            token.cancel();
        }
    }

    /// Cancels the run driving `session_id`. Returns `false` if no such run
    /// is in flight.
    pub fn cancel_session(&self, session_id: &str) -> bool {
        match self.active_runs().get(session_id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn config(&self) -> &UploadConfig {
        &self.config
    }

    /// Creates (and persists, if a store is attached) a pending session for
    /// a payload of `file_size` bytes using the configured chunk size.
    pub fn create_session(&self, file_size: u64) -> Result<UploadSession, UploadError> {
        self.config.validate()?;
        let session = UploadSession::new(file_size, self.config.chunk_size)?;
        self.persist(&session);
        info!(
            session = %session.id(),
            file_size,
            total_chunks = session.total_chunks(),
            "upload session created"
        );
        Ok(session)
    }

    /// Uploads every unacknowledged chunk of `session` and finalizes it.
    ///
    /// Starting and resuming are the same call: chunks already acknowledged
    /// are never sent again. On failure or cancellation the session keeps
    /// its acknowledged chunks so a later call can continue from there.
    pub async fn run(
        &self,
        session: &mut UploadSession,
        source: Arc<dyn ChunkSource>,
    ) -> Result<Artifact, UploadError> {
        self.config.validate()?;
        if source.len() != session.file_size() {
            return Err(TransferError::InvalidInput(format!(
                "source is {} bytes but session {} expects {}",
                source.len(),
                session.id(),
                session.file_size()
            ))
            .into());
        }

        let ctx = RunContext {
            cancel: self.cancel.child_token(),
            deadline: self.config.upload_timeout().map(|t| Instant::now() + t),
        };

        session.start()?;
        self.status_changed(session);
        info!(
            session = %session.id(),
            total_chunks = session.total_chunks(),
            acknowledged = session.acknowledged_count(),
            "upload started"
        );

        self.active_runs()
            .insert(session.id().to_string(), ctx.cancel.clone());
        let outcome = self.drive(session, &source, &ctx).await;
        self.active_runs().remove(session.id());

        match outcome {
            Ok(artifact) => {
                session.complete(artifact.clone())?;
                self.status_changed(session);
                self.emit(UploadEvent::Completed {
                    session_id: session.id().to_string(),
                    artifact: artifact.clone(),
                });
                self.forget(session);
                info!(session = %session.id(), artifact = %artifact, "upload completed");
                Ok(artifact)
            }
            Err(Halt::Cancelled) => {
                session.cancel()?;
                self.status_changed(session);
                info!(
                    session = %session.id(),
                    acknowledged = session.acknowledged_count(),
                    "upload cancelled"
                );
                Err(UploadError::Cancelled {
                    session_id: session.id().to_string(),
                    acknowledged: session.acknowledged_count(),
                    total_chunks: session.total_chunks(),
                })
            }
            Err(Halt::Failed(last_error)) => {
                self.mark_failed(session, &last_error.to_string())?;
                Err(UploadError::SessionFailed {
                    session_id: session.id().to_string(),
                    last_error,
                    acknowledged: session.acknowledged_count(),
                    total_chunks: session.total_chunks(),
                })
            }
            Err(Halt::Local(error)) => {
                self.mark_failed(session, &error.to_string())?;
                Err(UploadError::LocalFailure {
                    session_id: session.id().to_string(),
                    error,
                    acknowledged: session.acknowledged_count(),
                    total_chunks: session.total_chunks(),
                })
            }
        }
    }

    /// Upload loop followed by finalization.
    async fn drive(
        &self,
        session: &mut UploadSession,
        source: &Arc<dyn ChunkSource>,
        ctx: &RunContext,
    ) -> Result<Artifact, Halt> {
        let session_id = session.id().to_string();
        let total_chunks = session.total_chunks();
        let transport = self.transport;

        while let Some(index) = session.next_pending_index() {
            ctx.check_cancelled()?;

            let chunk = read_chunk(source, index, session.chunk_size()).await?;
            let id = session_id.as_str();
            let chunk_ref = &chunk;
            let ack = self
                .with_retry(session, Some(index), ctx, move || {
                    transport.send_chunk(id, total_chunks, chunk_ref)
                })
                .await?;

            if ack.index != index {
                return Err(Halt::Failed(TransportError::rejected(format!(
                    "backend acknowledged chunk {} but {index} was sent",
                    ack.index
                ))));
            }
            session.mark_acknowledged(index)?;
            self.persist(session);

            debug!(
                session = %session_id,
                index,
                acknowledged = session.acknowledged_count(),
                total_chunks,
                "chunk acknowledged"
            );
            self.emit(UploadEvent::ChunkAcknowledged {
                session_id: session_id.clone(),
                index,
                acknowledged: session.acknowledged_count(),
                total_chunks,
            });
        }

        ctx.check_cancelled()?;
        session.begin_finalize()?;
        self.status_changed(session);

        let id = session_id.as_str();
        self.with_retry(session, None, ctx, move || transport.finalize(id))
            .await
    }

    /// Runs a transport call with per-call timeout, bounded retries and
    /// exponential backoff.
    ///
    /// The call is attempted once plus at most `max_retries` more times.
    /// Non-retryable errors and an exhausted upload budget end the run
    /// immediately.
    async fn with_retry<'f, T, F>(
        &self,
        session: &mut UploadSession,
        index: Option<usize>,
        ctx: &RunContext,
        mut op: F,
    ) -> Result<T, Halt>
    where
        F: FnMut() -> TransportFuture<'f, T>,
    {
        let policy = self.config.retry_policy();
        let request_timeout = self.config.request_timeout();
        let mut retries: u32 = 0;

        loop {
            ctx.check_cancelled()?;

            let call_timeout = match ctx.remaining() {
                Some(remaining) => {
                    if remaining.is_zero() {
                        warn!(session = %session.id(), "upload time budget exhausted");
                        return Err(Halt::Failed(TransportError::timeout(
                            "upload time budget exhausted",
                        )));
                    }
                    remaining.min(request_timeout)
                }
                None => request_timeout,
            };

            let result = match tokio::time::timeout(call_timeout, op()).await {
                Ok(result) => result,
                Err(_) => Err(TransportError::timeout(format!(
                    "no response within {} ms",
                    call_timeout.as_millis()
                ))),
            };

            let err = match result {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if !err.is_retryable() {
                warn!(session = %session.id(), ?index, error = %err, "transport call rejected");
                return Err(Halt::Failed(err));
            }
            if retries >= policy.max_retries {
                warn!(
                    session = %session.id(),
                    ?index,
                    retries,
                    error = %err,
                    "retries exhausted"
                );
                return Err(Halt::Failed(err));
            }

            let delay = policy.delay_for_attempt(retries);
            retries += 1;
            session.record_retry();
            warn!(
                session = %session.id(),
                ?index,
                attempt = retries,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "transport call failed, retrying"
            );
            self.emit(UploadEvent::Retrying {
                session_id: session.id().to_string(),
                index,
                attempt: retries,
                delay,
                error: err,
            });

            let sleep_for = match ctx.remaining() {
                Some(remaining) => delay.min(remaining),
                None => delay,
            };
            tokio::select! {
                _ = ctx.cancel.cancelled() => return Err(Halt::Cancelled),
                _ = tokio::time::sleep(sleep_for) => {}
            }
        }
    }

    fn active_runs(&self) -> MutexGuard<'_, HashMap<String, CancellationToken>> {
        self.runs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn mark_failed(&self, session: &mut UploadSession, message: &str) -> Result<(), UploadError> {
        session.fail(message)?;
        self.status_changed(session);
        self.emit(UploadEvent::Failed {
            session_id: session.id().to_string(),
            error: message.to_string(),
        });
        error!(
            session = %session.id(),
            acknowledged = session.acknowledged_count(),
            total_chunks = session.total_chunks(),
            error = %message,
            "upload failed"
        );
        Ok(())
    }

    /// Persists the session and announces its current status.
    fn status_changed(&self, session: &UploadSession) {
        self.persist(session);
        self.emit(UploadEvent::StatusChanged {
            session_id: session.id().to_string(),
            status: session.status(),
        });
    }

    fn persist(&self, session: &UploadSession) {
        if let Some(store) = &self.store
            && let Err(e) = store.save(session)
        {
            warn!(session = %session.id(), error = %e, "failed to persist upload session");
        }
    }

    fn forget(&self, session: &UploadSession) {
        if let Some(store) = &self.store
            && let Err(e) = store.remove(session.id())
        {
            warn!(session = %session.id(), error = %e, "failed to remove upload session");
        }
    }

    /// Events are advisory: a full or unobserved channel drops them.
    fn emit(&self, event: UploadEvent) {
        let _ = self.events_tx.try_send(event);
    }
}

/// Slices a chunk off the blocking thread pool.
async fn read_chunk(
    source: &Arc<dyn ChunkSource>,
    index: usize,
    chunk_size: u64,
) -> Result<Chunk, TransferError> {
    let source = Arc::clone(source);
    tokio::task::spawn_blocking(move || source.read_chunk(index, chunk_size))
        .await
        .map_err(|e| {
            TransferError::Io(std::io::Error::other(format!("chunk read task failed: {e}")))
        })?
}
