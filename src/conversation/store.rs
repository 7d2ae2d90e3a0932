use log::info;
use std::collections::{ HashMap, VecDeque };
use std::sync::{ Arc, PoisonError, RwLock };

use super::{ ConversationConfig, ConversationController };
use crate::llm::chat::ChatClient;

/// Registry of live conversations for the HTTP surface. Oldest entries are
/// evicted once `capacity` is reached.
pub struct ConversationStore {
    client: Arc<dyn ChatClient>,
    config: ConversationConfig,
    capacity: usize,
    inner: RwLock<StoreInner>,
}

#[derive(Default)]
struct StoreInner {
    conversations: HashMap<String, Arc<ConversationController>>,
    order: VecDeque<String>,
}

impl ConversationStore {
    pub fn new(client: Arc<dyn ChatClient>, config: ConversationConfig, capacity: usize) -> Self {
        Self {
            client,
            config,
            capacity: capacity.max(1),
            inner: RwLock::new(StoreInner::default()),
        }
    }

    pub fn client(&self) -> &Arc<dyn ChatClient> {
        &self.client
    }

    pub fn config(&self) -> &ConversationConfig {
        &self.config
    }

    /// A controller not tracked by the store, e.g. one per WebSocket connection.
    pub fn detached(&self) -> ConversationController {
        ConversationController::new(self.client.clone(), self.config.clone())
    }

    pub fn create(&self) -> Arc<ConversationController> {
        let controller = Arc::new(self.detached());
        let id = controller.id().to_string();

        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        while inner.conversations.len() >= self.capacity {
            let Some(oldest) = inner.order.pop_front() else {
                break;
            };
            inner.conversations.remove(&oldest);
            info!("Evicted conversation {}", oldest);
        }
        inner.order.push_back(id.clone());
        inner.conversations.insert(id, controller.clone());
        controller
    }

    pub fn get(&self, id: &str) -> Option<Arc<ConversationController>> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).conversations.get(id).cloned()
    }

    pub fn remove(&self, id: &str) -> Option<Arc<ConversationController>> {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        inner.order.retain(|existing| existing != id);
        inner.conversations.remove(id)
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).conversations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
