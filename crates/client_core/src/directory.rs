use shared::domain::ChatId;

use crate::types::Conversation;

/// Snapshot of the conversations the backend knows about. Refreshes replace
/// the list wholesale.
#[derive(Debug, Default, Clone)]
pub struct ConversationDirectory {
    conversations: Vec<Conversation>,
}

impl ConversationDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn conversations(&self) -> &[Conversation] {
        &self.conversations
    }

    pub fn replace(&mut self, conversations: Vec<Conversation>) {
        self.conversations = conversations;
    }

    pub fn find(&self, chat_id: &ChatId) -> Option<&Conversation> {
        self.conversations
            .iter()
            .find(|conversation| &conversation.id == chat_id)
    }

    /// A brand-new conversation with a locally generated id. The backend only
    /// learns about it once a model is loaded or a message is sent.
    pub fn create_local() -> Conversation {
        Conversation::new(ChatId::generate())
    }
}
