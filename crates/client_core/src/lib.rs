use std::sync::Arc;

use shared::{
    domain::{ChatId, Device},
    error::TransportError,
};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

pub mod directory;
pub mod error;
pub mod session;
pub mod transport;
pub mod types;

pub use directory::ConversationDirectory;
pub use error::{ClientError, ValidationError};
pub use session::{
    ModelAction, ModelLifecycle, SendRequest, SessionSnapshot, SessionStore, SessionTicket,
    ToggleRequest,
};
pub use transport::{BackendConfig, ChatBackend, HttpChatBackend};
pub use types::{ChatReply, ChatStatus, Conversation, GenerationMetrics, Message};

const EVENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

/// User-facing notification, e.g. the outcome of a model load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub text: String,
}

impl Notice {
    fn new(level: NoticeLevel, text: impl Into<String>) -> Self {
        Self {
            level,
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum ClientEvent {
    SessionChanged(SessionSnapshot),
    ConversationsUpdated(Vec<Conversation>),
    CatalogUpdated(Vec<String>),
    Notice(Notice),
}

/// Orchestrates the session store, the conversation directory and the backend.
///
/// The store lock is never held across a network await; every response is
/// applied through a [`SessionTicket`] taken when the request was dispatched.
pub struct ChatClient {
    backend: Arc<dyn ChatBackend>,
    session: Mutex<SessionStore>,
    directory: Mutex<ConversationDirectory>,
    events: broadcast::Sender<ClientEvent>,
}

impl ChatClient {
    pub fn new(backend: Arc<dyn ChatBackend>) -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Arc::new(Self {
            backend,
            session: Mutex::new(SessionStore::new()),
            directory: Mutex::new(ConversationDirectory::new()),
            events,
        })
    }

    pub fn with_http(config: BackendConfig) -> Arc<Self> {
        Self::new(Arc::new(HttpChatBackend::new(config)))
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        self.session.lock().await.snapshot()
    }

    pub async fn conversations(&self) -> Vec<Conversation> {
        self.directory.lock().await.conversations().to_vec()
    }

    /// Startup sequence: catalog, directory, then the initial conversation if
    /// one was requested. Read failures never abort it.
    pub async fn initialize(&self, initial: Option<ChatId>) {
        self.refresh_models().await;
        self.refresh_conversations().await;
        if let Some(chat_id) = initial {
            self.open_conversation(chat_id).await;
        }
    }

    pub async fn refresh_models(&self) -> Vec<String> {
        let models = match self.backend.list_models().await {
            Ok(models) => models,
            Err(err) => {
                self.report_read_failure("models", &err);
                Vec::new()
            }
        };

        {
            let mut session = self.session.lock().await;
            session.set_catalog(models.clone());
            self.publish(&session);
        }
        let _ = self.events.send(ClientEvent::CatalogUpdated(models.clone()));
        models
    }

    pub async fn refresh_conversations(&self) -> Vec<Conversation> {
        let conversations = match self.backend.list_conversations().await {
            Ok(conversations) => conversations,
            Err(err) => {
                self.report_read_failure("conversations", &err);
                Vec::new()
            }
        };

        self.directory
            .lock()
            .await
            .replace(conversations.clone());
        let _ = self
            .events
            .send(ClientEvent::ConversationsUpdated(conversations.clone()));
        conversations
    }

    /// Generates a new conversation locally and makes it active. Nothing is
    /// fetched for it: the backend has no history or status for a fresh id.
    pub async fn create_conversation(&self) -> ChatId {
        let conversation = ConversationDirectory::create_local();
        {
            let mut session = self.session.lock().await;
            session.open(conversation.id.clone());
            self.publish(&session);
        }
        info!(chat_id = %conversation.id, "session: created conversation");

        self.refresh_conversations().await;
        conversation.id
    }

    /// Switches to an existing conversation and fetches its history and status
    /// concurrently. Each fetch only writes the fields it owns.
    pub async fn open_conversation(&self, chat_id: ChatId) {
        let ticket = {
            let mut session = self.session.lock().await;
            let ticket = session.open(chat_id);
            self.publish(&session);
            ticket
        };
        info!(chat_id = %ticket.chat_id, "session: opened conversation");

        let history = async {
            match self.backend.fetch_history(&ticket.chat_id).await {
                Ok(messages) => {
                    let mut session = self.session.lock().await;
                    if session.apply_history(&ticket, messages) {
                        self.publish(&session);
                    } else {
                        debug!(chat_id = %ticket.chat_id, "session: discarded stale history");
                    }
                }
                Err(err) => self.report_read_failure("history", &err),
            }
        };
        let status = async {
            match self.backend.fetch_status(&ticket.chat_id).await {
                Ok(status) => {
                    let mut session = self.session.lock().await;
                    if session.apply_status(&ticket, status) {
                        self.publish(&session);
                    } else {
                        debug!(chat_id = %ticket.chat_id, "session: discarded status");
                    }
                }
                Err(err) => self.report_read_failure("status", &err),
            }
        };
        futures::join!(history, status);
    }

    pub async fn select_model(&self, model: impl Into<String>) {
        let mut session = self.session.lock().await;
        session.select_model(model);
        self.publish(&session);
    }

    pub async fn select_device(&self, device: Device) {
        let mut session = self.session.lock().await;
        session.select_device(device);
        self.publish(&session);
    }

    /// Loads the selected model when none is loaded, unloads it otherwise.
    /// Rejected without touching the network while another toggle is pending,
    /// even one dispatched for a previous conversation. Returns the active
    /// session's lifecycle once the result is settled.
    pub async fn toggle_model(&self) -> Result<ModelLifecycle, ClientError> {
        let request = {
            let mut session = self.session.lock().await;
            let request = session.begin_toggle()?;
            self.publish(&session);
            request
        };
        info!(
            chat_id = %request.ticket.chat_id,
            model = %request.model,
            device = %request.device,
            action = ?request.action,
            "session: model toggle dispatched"
        );

        let outcome = self
            .backend
            .set_model_loaded(
                &request.ticket.chat_id,
                &request.model,
                request.device,
                request.action.desired(),
            )
            .await;

        let (applied, lifecycle) = {
            let mut session = self.session.lock().await;
            let applied = session.finish_toggle(&request, outcome.is_ok());
            // The in-flight guard is released even for a stale result.
            self.publish(&session);
            (applied, session.lifecycle())
        };

        match outcome {
            Ok(()) => {
                let text = match request.action {
                    ModelAction::Load => {
                        format!("Loaded {} on {}", request.model, request.device)
                    }
                    ModelAction::Unload => format!("Unloaded {}", request.model),
                };
                if applied {
                    self.notify(NoticeLevel::Info, text);
                } else {
                    debug!(chat_id = %request.ticket.chat_id, "session: discarded stale toggle result");
                }
                Ok(lifecycle)
            }
            Err(err) => {
                warn!(
                    chat_id = %request.ticket.chat_id,
                    model = %request.model,
                    error = %err,
                    "session: model toggle failed"
                );
                if applied {
                    self.notify(NoticeLevel::Error, format!("Error: {err}"));
                }
                Err(err.into())
            }
        }
    }

    /// Appends the trimmed input immediately, then the reply once the backend
    /// answers. A failed round-trip is recorded in the log as an assistant
    /// message carrying the error text.
    pub async fn send_message(&self, input: &str) -> Result<ChatReply, ClientError> {
        let request = {
            let mut session = self.session.lock().await;
            let request = session.begin_send(input)?;
            self.publish(&session);
            request
        };
        debug!(
            chat_id = %request.ticket.chat_id,
            request_id = request.request_id,
            "session: message dispatched"
        );

        let outcome = self
            .backend
            .send_message(
                &request.ticket.chat_id,
                &request.model,
                request.device,
                &request.text,
            )
            .await;
        if let Err(err) = &outcome {
            warn!(chat_id = %request.ticket.chat_id, error = %err, "session: send failed");
        }

        {
            let mut session = self.session.lock().await;
            if session.finish_send(&request, outcome.clone()) {
                self.publish(&session);
            } else {
                debug!(chat_id = %request.ticket.chat_id, "session: discarded stale reply");
            }
        }

        outcome.map_err(ClientError::from)
    }

    /// Deletes every stored message on the backend, then clears the local log
    /// and refreshes the directory.
    pub async fn clear_all_conversations(&self) -> Result<(), ClientError> {
        self.backend.clear_all().await?;
        {
            let mut session = self.session.lock().await;
            session.clear_messages();
            self.publish(&session);
        }
        info!("session: cleared all conversations");
        self.refresh_conversations().await;
        Ok(())
    }

    fn publish(&self, session: &SessionStore) {
        let _ = self
            .events
            .send(ClientEvent::SessionChanged(session.snapshot()));
    }

    fn notify(&self, level: NoticeLevel, text: impl Into<String>) {
        let _ = self.events.send(ClientEvent::Notice(Notice::new(level, text)));
    }

    fn report_read_failure(&self, what: &str, err: &TransportError) {
        warn!(error = %err, code = ?err.code, "session: failed to load {what}");
        self.notify(
            NoticeLevel::Warning,
            format!("Failed to load {what}: {err}"),
        );
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
