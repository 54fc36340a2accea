use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use super::conversation::{Conversation, ConversationId};
use crate::collections::{OrderedQueue, QueueError};

/// Errors returned by [`SessionRegistry`]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("conversation capacity is full (max: {capacity})")]
    CapacityExceeded { capacity: usize },

    #[error("conversation {0} not found")]
    NotFound(ConversationId),

    #[error("no conversations exist")]
    NoConversations,

    #[error("conversation {id} is missing from the eviction order: {source}")]
    OrderMismatch {
        id: ConversationId,
        #[source]
        source: QueueError,
    },
}

#[derive(Debug)]
struct RegistryState {
    items: HashMap<ConversationId, Arc<Conversation>>,
    /// Insertion order, oldest at the head
    order: OrderedQueue<ConversationId>,
    length: usize,
}

impl RegistryState {
    fn is_consistent(&self) -> bool {
        self.length == self.items.len() && self.length == self.order.len()
    }

    /// Capacity is the caller's concern
    fn insert(&mut self, history_capacity: usize) -> Arc<Conversation> {
        let mut id = ConversationId::new();
        while self.items.contains_key(&id) {
            id = ConversationId::new();
        }

        let conversation = Arc::new(Conversation::new(id, history_capacity));
        self.items.insert(id, Arc::clone(&conversation));
        self.order.enqueue(id);
        self.length += 1;
        debug_assert!(self.is_consistent());

        debug!(conversation_id = %id, length = self.length, "created conversation");
        conversation
    }

    fn evict_oldest(&mut self) -> Result<Arc<Conversation>, SessionError> {
        let id = self
            .order
            .dequeue()
            .map_err(|_| SessionError::NoConversations)?;

        match self.items.remove(&id) {
            Some(conversation) => {
                self.length -= 1;
                debug_assert!(self.is_consistent());
                debug!(conversation_id = %id, length = self.length, "evicted conversation");
                Ok(conversation)
            }
            None => {
                // Put it back so the structures stay in step
                self.order.enqueue(id);
                Err(SessionError::NotFound(id))
            }
        }
    }
}

/// Capacity-bounded set of live conversations.
///
/// The id map and the insertion-order queue are only ever mutated together
/// under one write lock, so callers never observe one without the other.
#[derive(Debug)]
pub struct SessionRegistry {
    capacity: usize,
    state: RwLock<RegistryState>,
}

impl SessionRegistry {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            state: RwLock::new(RegistryState {
                items: HashMap::with_capacity(capacity),
                order: OrderedQueue::with_capacity(capacity),
                length: 0,
            }),
        }
    }

    /// Register a new conversation with the given history bound
    pub fn create(&self, history_capacity: usize) -> Result<Arc<Conversation>, SessionError> {
        let mut state = self.state.write();
        if state.length >= self.capacity {
            return Err(SessionError::CapacityExceeded {
                capacity: self.capacity,
            });
        }
        Ok(state.insert(history_capacity))
    }

    /// Like [`SessionRegistry::create`], but when full the oldest conversation
    /// is dropped to make room. Eviction and insertion happen under one lock,
    /// so the freed slot cannot be taken by a concurrent create.
    pub fn create_evicting(
        &self,
        history_capacity: usize,
    ) -> Result<(Arc<Conversation>, Option<Arc<Conversation>>), SessionError> {
        let mut state = self.state.write();
        if self.capacity == 0 {
            return Err(SessionError::CapacityExceeded { capacity: 0 });
        }

        let evicted = if state.length >= self.capacity {
            Some(state.evict_oldest()?)
        } else {
            None
        };
        Ok((state.insert(history_capacity), evicted))
    }

    pub fn get(&self, id: &ConversationId) -> Option<Arc<Conversation>> {
        self.state.read().items.get(id).cloned()
    }

    pub fn contains(&self, id: &ConversationId) -> bool {
        self.state.read().items.contains_key(id)
    }

    /// Remove a conversation from both the map and the order queue
    pub fn delete(&self, id: &ConversationId) -> Result<(), SessionError> {
        let mut state = self.state.write();
        if state.length == 0 {
            return Err(SessionError::NoConversations);
        }
        if !state.items.contains_key(id) {
            return Err(SessionError::NotFound(*id));
        }

        // Order queue first: on failure the map entry is still in place.
        state
            .order
            .delete(id)
            .map_err(|source| SessionError::OrderMismatch { id: *id, source })?;
        state.items.remove(id);
        state.length -= 1;
        debug_assert!(state.is_consistent());

        debug!(conversation_id = %id, length = state.length, "deleted conversation");
        Ok(())
    }

    /// Drop the oldest conversation to make room, returning it
    pub fn evict_oldest(&self) -> Result<Arc<Conversation>, SessionError> {
        self.state.write().evict_oldest()
    }

    /// Conversation ids in insertion order, oldest first
    pub fn ids(&self) -> Vec<ConversationId> {
        self.state.read().order.iter().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.state.read().length
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_full(&self) -> bool {
        self.len() >= self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
