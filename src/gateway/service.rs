use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use super::messages::{InboundMessage, InboundRequest, OutboundReply, ReplyBody};
use crate::app::{Config, SessionSettings};
use crate::dispatch::{Dispatcher, DispatcherConfig, Prompt, WorkerPool};
use crate::provider::Provider;
use crate::session::{ConversationId, SessionError, SessionRegistry};
use crate::transport::{BusEvent, Topic, Transport};
use crate::utils::GatewayError;

const ANONYMOUS_USER: &str = "anonymous";

/// Front door of the engine: turns inbound requests into registry and
/// dispatcher calls and produces one reply per request
pub struct Gateway {
    sessions: SessionSettings,
    registry: Arc<SessionRegistry>,
    dispatcher: Dispatcher,
    transport: Arc<dyn Transport>,
    topic: Topic,
    shutdown: CancellationToken,
    requests: TaskTracker,
}

impl Gateway {
    /// Wire the registry, worker pool and dispatcher from `config`.
    /// Every worker carries `credential`.
    pub fn new(
        config: &Config,
        provider: Arc<dyn Provider>,
        transport: Arc<dyn Transport>,
        credential: &str,
        shutdown: CancellationToken,
    ) -> Self {
        let registry = Arc::new(SessionRegistry::new(config.sessions.capacity));
        let dispatcher = Dispatcher::new(
            DispatcherConfig::from_config(config),
            WorkerPool::new(config.dispatcher.workers, credential),
            Arc::clone(&registry),
            provider,
            Arc::clone(&transport),
            shutdown.clone(),
        );

        Self {
            sessions: config.sessions.clone(),
            registry,
            dispatcher,
            transport,
            topic: Topic::new(config.bus.topic.clone()),
            shutdown,
            requests: TaskTracker::new(),
        }
    }

    pub fn start(&self) -> Result<(), GatewayError> {
        self.dispatcher.start()?;
        Ok(())
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Open a conversation and announce it on the bus
    pub async fn open_chat(
        &self,
        from_user: &str,
        history_capacity: Option<usize>,
    ) -> Result<ConversationId, GatewayError> {
        let history_capacity = history_capacity.unwrap_or(self.sessions.history_capacity);

        let conversation = if self.sessions.evict_oldest_when_full {
            let (conversation, evicted) = self.registry.create_evicting(history_capacity)?;
            if let Some(evicted) = evicted {
                info!(conversation_id = %evicted.id(), "evicted oldest conversation");
            }
            conversation
        } else {
            self.registry.create(history_capacity)?
        };

        let id = conversation.id();
        let event = BusEvent::new_chat(id, from_user);
        let published = match event.to_payload() {
            Ok(payload) => self.transport.send(&self.topic, payload).await,
            Err(e) => Err(e),
        };
        if let Err(e) = published {
            warn!(conversation_id = %id, "could not announce new chat: {}", e);
        }

        info!(conversation_id = %id, from_user, "conversation opened");
        Ok(id)
    }

    /// Close a conversation
    pub fn end_chat(&self, id: &ConversationId) -> Result<(), GatewayError> {
        self.registry.delete(id)?;
        info!(conversation_id = %id, "conversation ended");
        Ok(())
    }

    /// Handle one raw request. Never fails: errors become error replies.
    pub async fn handle(&self, raw: &[u8]) -> OutboundReply {
        let request = match InboundRequest::decode(raw) {
            Ok(request) => request,
            Err(e) => {
                debug!("rejected inbound request: {}", e);
                return OutboundReply::error(None, &e);
            }
        };

        let request_id = request.request_id;
        match self.handle_message(request.message).await {
            Ok(body) => OutboundReply::new(request_id, body),
            Err(e) => OutboundReply::error(request_id, &e),
        }
    }

    async fn handle_message(&self, message: InboundMessage) -> Result<ReplyBody, GatewayError> {
        match message {
            InboundMessage::NewChat {
                from_user,
                history_capacity,
            } => {
                let from_user = from_user.as_deref().unwrap_or(ANONYMOUS_USER);
                let conversation_id = self.open_chat(from_user, history_capacity).await?;
                Ok(ReplyBody::Created { conversation_id })
            }
            InboundMessage::ChatMessage {
                conversation_id,
                prompt,
            } => {
                let answer = self
                    .dispatcher
                    .ask(Prompt::new(conversation_id, prompt))
                    .await?;
                Ok(ReplyBody::Answer {
                    conversation_id,
                    answer: answer.text,
                    bus_error: answer.transport_error.map(|e| e.to_string()),
                })
            }
            InboundMessage::EndChat { conversation_id } => {
                self.end_chat(&conversation_id)?;
                Ok(ReplyBody::Ended { conversation_id })
            }
            InboundMessage::History { conversation_id } => {
                let conversation = self
                    .registry
                    .get(&conversation_id)
                    .ok_or(SessionError::NotFound(conversation_id))?;
                Ok(ReplyBody::History {
                    conversation_id,
                    answers: conversation.history(),
                })
            }
        }
    }

    /// Serve requests until the inbound channel closes or shutdown fires.
    /// Requests are handled concurrently; each produces exactly one reply.
    pub async fn run(
        self: Arc<Self>,
        mut requests: mpsc::Receiver<Vec<u8>>,
        replies: mpsc::Sender<OutboundReply>,
    ) {
        info!("gateway listening");
        loop {
            let raw = tokio::select! {
                _ = self.shutdown.cancelled() => break,
                raw = requests.recv() => match raw {
                    Some(raw) => raw,
                    None => break,
                },
            };

            let gateway = Arc::clone(&self);
            let replies = replies.clone();
            self.requests.spawn(async move {
                let reply = gateway.handle(&raw).await;
                if replies.send(reply).await.is_err() {
                    debug!("reply channel closed, dropping reply");
                }
            });
        }

        self.requests.close();
        self.requests.wait().await;
        info!("gateway stopped");
    }

    /// Stop the dispatcher and wait for in-flight prompts
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        self.dispatcher.shutdown().await;
    }
}
