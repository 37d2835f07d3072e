use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use rowforge_core::{GenerateReply, GenerateRequest};

use crate::host::PluginHost;

/// Lifecycle of a worker handle.
///
/// `Bootstrapping` occurs exactly once per handle: the first request loads
/// the artifact and shared utilities. `Disposed` handles are never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleState {
    Cold,
    Bootstrapping,
    Idle,
    Busy,
    Disposed,
}

/// Errors on the dispatcher side of the request channel.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RequestError {
    #[error("generation request timed out")]
    Timeout,
    #[error("worker channel closed")]
    WorkerGone,
    #[error("request cancelled")]
    Cancelled,
    #[error("handle in state {0:?} cannot accept a request")]
    Unavailable(HandleState),
}

struct WorkerEnvelope {
    request: GenerateRequest,
    reply_tx: oneshot::Sender<GenerateReply>,
}

/// One isolated execution unit bound to one artifact.
///
/// The handle and its worker task share nothing: every request and reply
/// is moved through the channel. Exclusively owned; moves between the pool
/// and exactly one row task at a time.
pub struct WorkerHandle {
    plugin_id: String,
    state: HandleState,
    tx: mpsc::Sender<WorkerEnvelope>,
    join: JoinHandle<()>,
}

impl WorkerHandle {
    /// Spawn a fresh handle for `plugin_id`, bound to `artifact`.
    ///
    /// Nothing is loaded until the first request arrives.
    pub fn spawn(plugin_id: String, host: Arc<dyn PluginHost>, artifact: PathBuf) -> Self {
        let (tx, rx) = mpsc::channel(1);
        let join = tokio::spawn(worker_task(plugin_id.clone(), host, artifact, rx));
        Self {
            plugin_id,
            state: HandleState::Cold,
            tx,
            join,
        }
    }

    pub fn plugin_id(&self) -> &str {
        &self.plugin_id
    }

    pub fn state(&self) -> HandleState {
        self.state
    }

    pub fn is_idle(&self) -> bool {
        self.state == HandleState::Idle
    }

    /// True until the first request has been answered; the caller attaches
    /// the bootstrap payload exactly when this holds.
    pub fn needs_bootstrap(&self) -> bool {
        self.state == HandleState::Cold
    }

    /// Send one request and await its single reply.
    ///
    /// The pool never pipelines: a second request is rejected until the
    /// reply for the first arrives. A timeout, a dead channel, or
    /// cancellation mid-flight condemns the handle — a late reply must
    /// never be consumed as if it belonged to a new request.
    pub async fn send_request(
        &mut self,
        request: GenerateRequest,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<GenerateReply, RequestError> {
        let was_cold = match self.state {
            HandleState::Cold => {
                self.state = HandleState::Bootstrapping;
                true
            }
            HandleState::Idle => {
                self.state = HandleState::Busy;
                false
            }
            other => return Err(RequestError::Unavailable(other)),
        };

        let (reply_tx, reply_rx) = oneshot::channel();
        let envelope = WorkerEnvelope { request, reply_tx };
        let tx = self.tx.clone();

        tokio::select! {
            sent = tx.send(envelope) => {
                if sent.is_err() {
                    self.dispose();
                    return Err(RequestError::WorkerGone);
                }
            }
            _ = cancel.cancelled() => {
                self.dispose();
                return Err(RequestError::Cancelled);
            }
        }

        tokio::select! {
            outcome = tokio::time::timeout(timeout, reply_rx) => match outcome {
                Ok(Ok(reply)) => {
                    // A failure while bootstrapping means the artifact or
                    // utilities never loaded; the handle is unusable.
                    if was_cold && matches!(reply, GenerateReply::Failed { .. }) {
                        self.dispose();
                    } else {
                        self.state = HandleState::Idle;
                    }
                    Ok(reply)
                }
                Ok(Err(_)) => {
                    self.dispose();
                    Err(RequestError::WorkerGone)
                }
                Err(_) => {
                    warn!(plugin_id = %self.plugin_id, "generation request timed out");
                    self.dispose();
                    Err(RequestError::Timeout)
                }
            },
            _ = cancel.cancelled() => {
                self.dispose();
                Err(RequestError::Cancelled)
            }
        }
    }

    /// Tear the handle down. Disposed handles are never reused.
    pub fn dispose(&mut self) {
        if self.state != HandleState::Disposed {
            debug!(plugin_id = %self.plugin_id, "disposing worker handle");
            self.state = HandleState::Disposed;
            self.join.abort();
        }
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        self.join.abort();
    }
}

async fn worker_task(
    plugin_id: String,
    host: Arc<dyn PluginHost>,
    artifact: PathBuf,
    mut rx: mpsc::Receiver<WorkerEnvelope>,
) {
    let mut generator = None;
    let mut bootstrapped = false;

    while let Some(WorkerEnvelope { request, reply_tx }) = rx.recv().await {
        if generator.is_none() {
            match host.load_worker(&plugin_id, &artifact) {
                Ok(loaded) => generator = Some(loaded),
                Err(err) => {
                    warn!(plugin_id = %plugin_id, error = %err, "failed to load worker artifact");
                    let _ = reply_tx.send(GenerateReply::Failed {
                        message: err.to_string(),
                    });
                    continue;
                }
            }
        }
        let Some(generator) = generator.as_mut() else {
            continue;
        };

        // The bootstrap instruction is applied at most once; it is ignored
        // on every later request even if present.
        if let Some(resources) = request.bootstrap.as_ref() {
            if !bootstrapped {
                if let Err(err) = generator.bootstrap(resources) {
                    let _ = reply_tx.send(GenerateReply::Failed {
                        message: err.to_string(),
                    });
                    continue;
                }
                bootstrapped = true;
            }
        }

        let outcome =
            std::panic::catch_unwind(AssertUnwindSafe(|| generator.generate(&request)));
        let reply = match outcome {
            Ok(Ok(value)) => GenerateReply::Value(value),
            Ok(Err(err)) => GenerateReply::Failed {
                message: err.to_string(),
            },
            Err(panic) => GenerateReply::Failed {
                message: panic_message(panic),
            },
        };
        let _ = reply_tx.send(reply);
    }
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "worker panicked".to_string()
    }
}
