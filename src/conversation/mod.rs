//! Conversation controller: owns the message log of one chat and drives one
//! request/response cycle per user message.

pub mod store;

use log::{ debug, info, warn };
use std::sync::atomic::{ AtomicBool, AtomicU64, Ordering };
use std::sync::{ Arc, PoisonError, RwLock };
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{ broadcast, Mutex };
use uuid::Uuid;

use crate::config::prompt::{ build_request, DEFAULT_SYSTEM_PROMPT };
use crate::llm::chat::ChatClient;
use crate::llm::{ LlmError, RequestShape };
use crate::models::chat::{ ConversationMessage, MessageId, ParsedResponse };
use crate::parser::parse_response;

pub use store::ConversationStore;

const EVENT_CHANNEL_CAPACITY: usize = 64;
pub const TRANSPORT_FAILURE_NOTICE: &str = "Failed to get response. Please try again.";

#[derive(Debug, Clone)]
pub struct ConversationConfig {
    pub system_prompt: Arc<str>,
    pub request_shape: RequestShape,
    pub request_timeout: Duration,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            system_prompt: Arc::from(DEFAULT_SYSTEM_PROMPT),
            request_shape: RequestShape::Single,
            request_timeout: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConversationEvent {
    MessageAppended(ConversationMessage),
    TypingStarted,
    TypingStopped,
    /// Transient user-facing notice, e.g. a failed backend call.
    Notification(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConversationError {
    #[error("Message {0} not found")]
    NotFound(MessageId),
    #[error("Message {0} has nothing to copy")]
    NotCopyable(MessageId),
    #[error("A response is still being generated")]
    Busy,
}

pub struct ConversationController {
    id: String,
    client: Arc<dyn ChatClient>,
    config: ConversationConfig,
    log: RwLock<Vec<ConversationMessage>>,
    next_id: AtomicU64,
    // Held for the whole cycle so at most one request is in flight and
    // replies land in the order their requests were issued.
    in_flight: Mutex<()>,
    awaiting: AtomicBool,
    events: broadcast::Sender<ConversationEvent>,
}

impl ConversationController {
    pub fn new(client: Arc<dyn ChatClient>, config: ConversationConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            id: Uuid::new_v4().to_string(),
            client,
            config,
            log: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
            in_flight: Mutex::new(()),
            awaiting: AtomicBool::new(false),
            events,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ConversationEvent> {
        self.events.subscribe()
    }

    /// True while a reply is being generated (the typing indicator).
    pub fn is_awaiting(&self) -> bool {
        self.awaiting.load(Ordering::SeqCst)
    }

    pub fn current_messages(&self) -> Vec<ConversationMessage> {
        self.log.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn message(&self, id: MessageId) -> Option<ConversationMessage> {
        self.log
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|m| m.id == id)
            .cloned()
    }

    /// Runs one full cycle for `text`. Sends issued while another cycle is
    /// running wait for it to finish. Blank input is ignored.
    pub async fn send_user_message(&self, text: &str) {
        if text.trim().is_empty() {
            return;
        }

        let _slot = self.in_flight.lock().await;
        let user_message = self.append(|id| ConversationMessage::user(id, text));
        debug!("Conversation {}: user message {} appended", self.id, user_message.id);
        self.set_awaiting(true);
        // Declared after `_slot` so it closes the cycle before the slot is released.
        let mut cycle = OpenCycle { controller: self, response: None };

        let request = build_request(
            &self.config.system_prompt,
            self.config.request_shape,
            &self.current_messages()
        );

        let completion = tokio::time::timeout(
            self.config.request_timeout,
            self.client.complete(&request)
        ).await;

        let response = match completion {
            Ok(Ok(completion)) => {
                info!(
                    "Conversation {}: completion received from {} ({} bytes)",
                    self.id,
                    completion.model,
                    completion.content.len()
                );
                parse_response(&completion.content)
            }
            Ok(Err(e)) => self.transport_failure(e),
            Err(_) => self.transport_failure(LlmError::Timeout(self.config.request_timeout)),
        };

        cycle.response = Some(response);
    }

    pub fn copy_assistant_message(&self, id: MessageId) -> Result<String, ConversationError> {
        let message = self.message(id).ok_or(ConversationError::NotFound(id))?;
        message
            .response()
            .and_then(ParsedResponse::copy_text)
            .ok_or(ConversationError::NotCopyable(id))
    }

    pub fn follow_ups(&self, id: MessageId) -> Result<Vec<String>, ConversationError> {
        let message = self.message(id).ok_or(ConversationError::NotFound(id))?;
        Ok(
            message
                .response()
                .map(|r| r.suggested_follow_ups().to_vec())
                .unwrap_or_default()
        )
    }

    /// Starts a fresh chat. Refused while a reply is pending.
    pub fn clear(&self) -> Result<(), ConversationError> {
        let _slot = self.in_flight.try_lock().map_err(|_| ConversationError::Busy)?;
        self.log.write().unwrap_or_else(PoisonError::into_inner).clear();
        info!("Conversation {} cleared", self.id);
        Ok(())
    }

    fn append(&self, build: impl FnOnce(MessageId) -> ConversationMessage) -> ConversationMessage {
        let message = {
            let mut log = self.log.write().unwrap_or_else(PoisonError::into_inner);
            let id = MessageId(self.next_id.fetch_add(1, Ordering::SeqCst));
            let message = build(id);
            log.push(message.clone());
            message
        };
        let _ = self.events.send(ConversationEvent::MessageAppended(message.clone()));
        message
    }

    fn set_awaiting(&self, awaiting: bool) {
        self.awaiting.store(awaiting, Ordering::SeqCst);
        let event = if awaiting {
            ConversationEvent::TypingStarted
        } else {
            ConversationEvent::TypingStopped
        };
        let _ = self.events.send(event);
    }

    fn transport_failure(&self, error: LlmError) -> ParsedResponse {
        warn!("Conversation {}: completion failed: {}", self.id, error);
        let _ = self.events.send(ConversationEvent::Notification(TRANSPORT_FAILURE_NOTICE.to_string()));
        ParsedResponse::RefusalOrError
    }
}

/// Closes a cycle whose user turn is already in the log. If the send future
/// is dropped before a reply arrives, the cycle still ends with an error turn.
struct OpenCycle<'a> {
    controller: &'a ConversationController,
    response: Option<ParsedResponse>,
}

impl Drop for OpenCycle<'_> {
    fn drop(&mut self) {
        let response = self.response.take().unwrap_or_else(|| {
            warn!("Conversation {}: send cancelled before a reply arrived", self.controller.id);
            ParsedResponse::RefusalOrError
        });
        self.controller.append(|id| ConversationMessage::assistant(id, response));
        self.controller.set_awaiting(false);
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{ AtomicUsize, Ordering };
    use std::sync::Mutex;
    use std::time::Duration;

    use crate::llm::chat::{ ChatClient, CompletionResponse, LlmMessage };
    use crate::llm::{ LlmError, LlmType };

    /// Replays canned replies in call order and records every request.
    #[derive(Default)]
    pub struct ScriptedClient {
        replies: Mutex<VecDeque<Result<String, LlmError>>>,
        pub requests: Mutex<Vec<Vec<LlmMessage>>>,
        delay: Option<Duration>,
        active: AtomicUsize,
        pub max_active: AtomicUsize,
    }

    impl ScriptedClient {
        pub fn new(replies: Vec<Result<String, LlmError>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                ..Self::default()
            }
        }

        pub fn replying(replies: &[&str]) -> Self {
            Self::new(replies.iter().map(|r| Ok(r.to_string())).collect())
        }

        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }
    }

    #[async_trait]
    impl ChatClient for ScriptedClient {
        async fn complete(&self, messages: &[LlmMessage]) -> Result<CompletionResponse, LlmError> {
            let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_active.fetch_max(active, Ordering::SeqCst);
            self.requests.lock().unwrap().push(messages.to_vec());
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.active.fetch_sub(1, Ordering::SeqCst);
            let reply = self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(LlmError::EmptyResponse(LlmType::Groq)));
            reply.map(|content| CompletionResponse {
                content,
                model: "scripted".to_string(),
            })
        }

        fn get_model(&self) -> String {
            "scripted".to_string()
        }

        fn get_base_url(&self) -> Option<String> {
            None
        }
    }
}
