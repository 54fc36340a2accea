use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use super::worker::{WorkerError, WorkerLease, WorkerPool};
use super::DispatchError;
use crate::app::Config;
use crate::constants::PROMPT_PREVIEW_CHARS;
use crate::provider::Provider;
use crate::session::{Conversation, ConversationId, SessionRegistry};
use crate::transport::{BusEvent, Topic, Transport, TransportError};

/// What `submit` does when the inbound queue is full
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueFullPolicy {
    /// Reject with [`DispatchError::QueueFull`]
    #[default]
    FailFast,
    /// Wait for room (backpressure on the submitter)
    Block,
}

/// Runtime settings for a [`Dispatcher`]
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    pub prompt_timeout: Duration,
    pub queue_buffer: usize,
    pub queue_full_policy: QueueFullPolicy,
    /// Topic answers are published to
    pub topic: Topic,
}

impl DispatcherConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            prompt_timeout: Duration::from_millis(config.dispatcher.prompt_timeout_ms),
            queue_buffer: config.dispatcher.queue_buffer,
            queue_full_policy: config.dispatcher.queue_full_policy,
            topic: Topic::new(config.bus.topic.clone()),
        }
    }
}

/// A request to answer `text` within a conversation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub conversation_id: ConversationId,
    pub text: String,
}

impl Prompt {
    pub fn new(conversation_id: ConversationId, text: impl Into<String>) -> Self {
        Self {
            conversation_id,
            text: text.into(),
        }
    }

    fn preview(&self) -> String {
        let mut preview: String = self.text.chars().take(PROMPT_PREVIEW_CHARS).collect();
        if preview.len() < self.text.len() {
            preview.push_str("...");
        }
        preview
    }
}

/// A successfully answered prompt
#[derive(Debug)]
pub struct Answer {
    pub conversation_id: ConversationId,
    pub text: String,
    pub worker_id: usize,
    /// Set when publishing to the bus failed. The answer itself still stands.
    pub transport_error: Option<TransportError>,
}

type Outcome = Result<Answer, DispatchError>;

/// Receives the single terminal outcome of a submitted prompt
#[derive(Debug)]
pub struct PendingAnswer {
    conversation_id: ConversationId,
    rx: oneshot::Receiver<Outcome>,
}

impl PendingAnswer {
    pub fn conversation_id(&self) -> ConversationId {
        self.conversation_id
    }

    /// Every normal path, shutdown included, resolves explicitly. A dropped
    /// sender means the prompt task died.
    pub async fn wait(self) -> Outcome {
        self.rx.await.unwrap_or(Err(DispatchError::Aborted))
    }
}

struct Job {
    prompt: Prompt,
    reply: oneshot::Sender<Outcome>,
}

impl Job {
    fn resolve(self, outcome: Outcome) {
        if self.reply.send(outcome).is_err() {
            debug!(
                conversation_id = %self.prompt.conversation_id,
                "submitter went away before the outcome was delivered"
            );
        }
    }
}

/// Everything an in-flight prompt needs, shared between the sequencer and
/// the per-prompt tasks
struct DispatchContext {
    pool: WorkerPool,
    registry: Arc<SessionRegistry>,
    provider: Arc<dyn Provider>,
    transport: Arc<dyn Transport>,
    topic: Topic,
    prompt_timeout: Duration,
    shutdown: CancellationToken,
    in_flight: TaskTracker,
}

/// Accepts prompts onto a bounded queue and runs them on free workers.
///
/// A single sequencer task takes prompts in FIFO order and hands each to the
/// first free worker; every assigned prompt then runs on its own task, racing
/// the provider call against the prompt timeout and process shutdown.
/// Completion order is not guaranteed.
pub struct Dispatcher {
    queue: mpsc::Sender<Job>,
    pending: Mutex<Option<mpsc::Receiver<Job>>>,
    sequencer: Mutex<Option<JoinHandle<()>>>,
    queue_buffer: usize,
    policy: QueueFullPolicy,
    context: Arc<DispatchContext>,
}

impl Dispatcher {
    /// Build a dispatcher. Prompts can be queued immediately but are not
    /// processed until [`Dispatcher::start`].
    pub fn new(
        config: DispatcherConfig,
        pool: WorkerPool,
        registry: Arc<SessionRegistry>,
        provider: Arc<dyn Provider>,
        transport: Arc<dyn Transport>,
        shutdown: CancellationToken,
    ) -> Self {
        let queue_buffer = config.queue_buffer.max(1);
        let (queue, pending) = mpsc::channel(queue_buffer);

        Self {
            queue,
            pending: Mutex::new(Some(pending)),
            sequencer: Mutex::new(None),
            queue_buffer,
            policy: config.queue_full_policy,
            context: Arc::new(DispatchContext {
                pool,
                registry,
                provider,
                transport,
                topic: config.topic,
                prompt_timeout: config.prompt_timeout,
                shutdown,
                in_flight: TaskTracker::new(),
            }),
        }
    }

    /// Spawn the sequencer on the current tokio runtime
    pub fn start(&self) -> Result<(), DispatchError> {
        let rx = self
            .pending
            .lock()
            .take()
            .ok_or(DispatchError::AlreadyStarted)?;

        let context = Arc::clone(&self.context);
        let handle = tokio::spawn(context.sequence(rx));
        *self.sequencer.lock() = Some(handle);

        info!(
            workers = self.context.pool.len(),
            queue_buffer = self.queue_buffer,
            timeout = ?self.context.prompt_timeout,
            "dispatcher started"
        );
        Ok(())
    }

    /// Queue a prompt. The returned handle resolves exactly once with the
    /// answer or the reason there is none.
    pub async fn submit(&self, prompt: Prompt) -> Result<PendingAnswer, DispatchError> {
        if self.context.shutdown.is_cancelled() {
            return Err(DispatchError::ShuttingDown);
        }

        let conversation_id = prompt.conversation_id;
        let (reply, rx) = oneshot::channel();
        let job = Job { prompt, reply };

        match self.policy {
            QueueFullPolicy::FailFast => {
                self.queue.try_send(job).map_err(|e| match e {
                    mpsc::error::TrySendError::Full(_) => DispatchError::QueueFull {
                        capacity: self.queue_buffer,
                    },
                    mpsc::error::TrySendError::Closed(_) => DispatchError::ShuttingDown,
                })?;
            }
            QueueFullPolicy::Block => {
                tokio::select! {
                    sent = self.queue.send(job) => sent.map_err(|_| DispatchError::ShuttingDown)?,
                    _ = self.context.shutdown.cancelled() => return Err(DispatchError::ShuttingDown),
                }
            }
        }

        debug!(conversation_id = %conversation_id, "prompt queued");
        Ok(PendingAnswer {
            conversation_id,
            rx,
        })
    }

    /// Submit and wait for the outcome
    pub async fn ask(&self, prompt: Prompt) -> Outcome {
        self.submit(prompt).await?.wait().await
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.context.pool
    }

    /// Stop accepting work, then wait for the sequencer and every in-flight
    /// prompt to resolve
    pub async fn shutdown(&self) {
        self.context.shutdown.cancel();

        let sequencer = self.sequencer.lock().take();
        if let Some(handle) = sequencer {
            if let Err(e) = handle.await {
                warn!("dispatcher sequencer ended abnormally: {}", e);
            }
        }

        self.context.in_flight.close();
        self.context.in_flight.wait().await;
        info!("dispatcher stopped");
    }
}

impl DispatchContext {
    /// The sequencer loop: FIFO over the inbound queue until shutdown
    async fn sequence(self: Arc<Self>, mut rx: mpsc::Receiver<Job>) {
        loop {
            let job = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                job = rx.recv() => match job {
                    Some(job) => job,
                    None => break,
                },
            };
            self.dispatch(job);
        }

        rx.close();
        while let Ok(job) = rx.try_recv() {
            job.resolve(Err(DispatchError::ShuttingDown));
        }
        debug!("sequencer drained");
    }

    fn dispatch(self: &Arc<Self>, job: Job) {
        let conversation_id = job.prompt.conversation_id;

        let Some(conversation) = self.registry.get(&conversation_id) else {
            job.resolve(Err(DispatchError::ConversationNotFound(conversation_id)));
            return;
        };

        let Some(lease) = self.pool.acquire() else {
            warn!(conversation_id = %conversation_id, "no worker available");
            job.resolve(Err(DispatchError::WorkerUnavailable));
            return;
        };

        debug!(
            conversation_id = %conversation_id,
            worker_id = lease.worker_id(),
            "prompt assigned"
        );

        let context = Arc::clone(self);
        self.in_flight.spawn(async move {
            let outcome = context.run(&job.prompt, conversation, lease).await;
            job.resolve(outcome);
        });
    }

    async fn run(&self, prompt: &Prompt, conversation: Arc<Conversation>, lease: WorkerLease) -> Outcome {
        let conversation_id = prompt.conversation_id;
        let worker_id = lease.worker_id();

        // Dropping the call on timeout or shutdown drops the lease with it,
        // which frees the worker.
        let call = lease.compile(self.provider.as_ref(), &prompt.text);
        let result = tokio::select! {
            result = call => result,
            _ = tokio::time::sleep(self.prompt_timeout) => {
                warn!(conversation_id = %conversation_id, worker_id, "prompt timed out");
                return Err(DispatchError::Timeout {
                    conversation_id,
                    after: self.prompt_timeout,
                });
            }
            _ = self.shutdown.cancelled() => return Err(DispatchError::ShuttingDown),
        };

        let text = result.map_err(|e| match e {
            WorkerError::Busy(id) => DispatchError::WorkerBusy(id),
            WorkerError::Provider(source) => {
                warn!(conversation_id = %conversation_id, worker_id, "provider failed: {}", source);
                DispatchError::Provider {
                    conversation_id,
                    prompt_preview: prompt.preview(),
                    source,
                }
            }
        })?;

        // Ended while the call was in flight: drop the answer
        if !self.registry.contains(&conversation_id) {
            debug!(conversation_id = %conversation_id, worker_id, "conversation ended before the answer arrived");
            return Err(DispatchError::ConversationNotFound(conversation_id));
        }

        conversation.append_answer(text.clone());
        let transport_error = self.publish(conversation_id, &text).await.err();

        info!(conversation_id = %conversation_id, worker_id, "prompt answered");
        Ok(Answer {
            conversation_id,
            text,
            worker_id,
            transport_error,
        })
    }

    async fn publish(&self, conversation_id: ConversationId, text: &str) -> Result<(), TransportError> {
        let payload = BusEvent::answer(conversation_id, text).to_payload()?;
        self.transport
            .send(&self.topic, payload)
            .await
            .inspect_err(|e| {
                warn!(conversation_id = %conversation_id, topic = %self.topic, "could not publish answer: {}", e)
            })
    }
}
