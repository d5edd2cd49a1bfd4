//! Session state: the active conversation, its message log and the model
//! lifecycle.
//!
//! Every operation here is a synchronous transition. Network round-trips are
//! split into a `begin_*` step that validates and stamps the request with a
//! [`SessionTicket`], and a `finish_*`/`apply_*` step that only mutates state
//! when the ticket still names the active session.

use std::mem;

use chrono::Utc;
use shared::{
    domain::{ChatId, Device, Sender},
    error::TransportError,
};
use tracing::debug;

use crate::{
    error::ValidationError,
    types::{ChatReply, ChatStatus, Message},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModelLifecycle {
    #[default]
    Unloaded,
    Loading,
    Loaded,
    Unloading,
}

impl ModelLifecycle {
    pub fn is_in_flight(self) -> bool {
        matches!(self, ModelLifecycle::Loading | ModelLifecycle::Unloading)
    }

    pub fn is_loaded(self) -> bool {
        self == ModelLifecycle::Loaded
    }
}

/// Identifies one visit of a conversation. `generation` advances on every
/// open, so responses from a previous visit of the same id are stale too.
/// `log_epoch` advances whenever the log is wiped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionTicket {
    pub chat_id: ChatId,
    generation: u64,
    log_epoch: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelAction {
    Load,
    Unload,
}

impl ModelAction {
    /// The `desired` flag of `set_model_loaded`.
    pub fn desired(self) -> bool {
        self == ModelAction::Load
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToggleRequest {
    pub ticket: SessionTicket,
    pub action: ModelAction,
    pub model: String,
    pub device: Device,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendRequest {
    pub ticket: SessionTicket,
    pub request_id: u64,
    pub model: String,
    pub device: Device,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub active: Option<ChatId>,
    pub messages: Vec<Message>,
    pub catalog: Vec<String>,
    pub selected_model: Option<String>,
    pub device: Device,
    pub lifecycle: ModelLifecycle,
    /// A load/unload is on the wire, possibly for a previous conversation.
    pub toggle_pending: bool,
    pub pending_sends: usize,
}

impl SessionSnapshot {
    pub fn loaded(&self) -> bool {
        self.lifecycle.is_loaded()
    }

    /// True while at least one reply is outstanding.
    pub fn is_thinking(&self) -> bool {
        self.pending_sends > 0
    }
}

#[derive(Debug, Default)]
pub struct SessionStore {
    active: Option<ChatId>,
    generation: u64,
    messages: Vec<Message>,
    catalog: Vec<String>,
    selected_model: Option<String>,
    device: Device,
    lifecycle: ModelLifecycle,
    /// Spans conversation switches: one load/unload on the wire at a time.
    toggle_in_flight: bool,
    toggled_since_open: bool,
    log_epoch: u64,
    next_request_id: u64,
    pending_sends: usize,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active(&self) -> Option<&ChatId> {
        self.active.as_ref()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn catalog(&self) -> &[String] {
        &self.catalog
    }

    pub fn selected_model(&self) -> Option<&str> {
        self.selected_model.as_deref()
    }

    pub fn device(&self) -> Device {
        self.device
    }

    pub fn lifecycle(&self) -> ModelLifecycle {
        self.lifecycle
    }

    pub fn ticket(&self) -> Option<SessionTicket> {
        self.active.clone().map(|chat_id| SessionTicket {
            chat_id,
            generation: self.generation,
            log_epoch: self.log_epoch,
        })
    }

    pub fn is_current(&self, ticket: &SessionTicket) -> bool {
        ticket.generation == self.generation && self.active.as_ref() == Some(&ticket.chat_id)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            active: self.active.clone(),
            messages: self.messages.clone(),
            catalog: self.catalog.clone(),
            selected_model: self.selected_model.clone(),
            device: self.device,
            lifecycle: self.lifecycle,
            toggle_pending: self.toggle_in_flight,
            pending_sends: self.pending_sends,
        }
    }

    /// Makes `chat_id` the active conversation with an empty log. The
    /// lifecycle reads `Unloaded` until a status for the new visit arrives.
    pub fn open(&mut self, chat_id: ChatId) -> SessionTicket {
        self.generation += 1;
        self.active = Some(chat_id.clone());
        self.messages.clear();
        self.lifecycle = ModelLifecycle::Unloaded;
        self.toggled_since_open = false;
        self.pending_sends = 0;
        SessionTicket {
            chat_id,
            generation: self.generation,
            log_epoch: self.log_epoch,
        }
    }

    pub fn is_toggle_in_flight(&self) -> bool {
        self.toggle_in_flight
    }

    /// Places the fetched history ahead of anything appended locally since
    /// the conversation was opened. History fetched before the log was wiped
    /// is dropped.
    pub fn apply_history(&mut self, ticket: &SessionTicket, history: Vec<Message>) -> bool {
        if !self.is_current(ticket) || ticket.log_epoch != self.log_epoch {
            return false;
        }
        let local = mem::replace(&mut self.messages, history);
        self.messages.extend(local);
        true
    }

    /// Applies model, device and loaded flag from a status fetch. Ignored once
    /// a load/unload has been dispatched for this visit.
    pub fn apply_status(&mut self, ticket: &SessionTicket, status: ChatStatus) -> bool {
        if !self.is_current(ticket) {
            return false;
        }
        if self.toggled_since_open {
            debug!(chat_id = %ticket.chat_id, "session: status superseded by model toggle");
            return false;
        }
        if let Some(model) = status.model {
            self.selected_model = Some(model);
        }
        self.device = status.device;
        self.lifecycle = if status.loaded {
            ModelLifecycle::Loaded
        } else {
            ModelLifecycle::Unloaded
        };
        true
    }

    /// Replaces the model catalog. A selection that is missing or unknown to a
    /// non-empty catalog moves to its first entry.
    pub fn set_catalog(&mut self, models: Vec<String>) {
        self.catalog = models;
        let known = self
            .selected_model
            .as_ref()
            .is_some_and(|selected| self.catalog.contains(selected));
        if !known {
            if let Some(first) = self.catalog.first() {
                self.selected_model = Some(first.clone());
            }
        }
    }

    pub fn select_model(&mut self, model: impl Into<String>) {
        let model = model.into();
        self.selected_model = (!model.trim().is_empty()).then_some(model);
    }

    pub fn select_device(&mut self, device: Device) {
        self.device = device;
    }

    /// Wipes the log and invalidates history fetches still in flight.
    pub fn clear_messages(&mut self) {
        self.messages.clear();
        self.log_epoch += 1;
    }

    pub fn begin_toggle(&mut self) -> Result<ToggleRequest, ValidationError> {
        if self.toggle_in_flight || self.lifecycle.is_in_flight() {
            return Err(ValidationError::ToggleInFlight);
        }
        let ticket = self.ticket().ok_or(ValidationError::NoActiveConversation)?;
        let model = self
            .selected_model
            .clone()
            .ok_or(ValidationError::NoModelSelected)?;

        let action = if self.lifecycle.is_loaded() {
            self.lifecycle = ModelLifecycle::Unloading;
            ModelAction::Unload
        } else {
            self.lifecycle = ModelLifecycle::Loading;
            ModelAction::Load
        };
        self.toggle_in_flight = true;
        self.toggled_since_open = true;

        Ok(ToggleRequest {
            ticket,
            action,
            model,
            device: self.device,
        })
    }

    /// Settles a toggle. Failures roll back to the state before the request;
    /// a successful unload clears the log. A stale result releases the
    /// in-flight guard and changes nothing else.
    pub fn finish_toggle(&mut self, request: &ToggleRequest, succeeded: bool) -> bool {
        self.toggle_in_flight = false;
        if !self.is_current(&request.ticket) {
            return false;
        }
        self.lifecycle = match (request.action, succeeded) {
            (ModelAction::Load, true) | (ModelAction::Unload, false) => ModelLifecycle::Loaded,
            (ModelAction::Load, false) => ModelLifecycle::Unloaded,
            (ModelAction::Unload, true) => {
                self.clear_messages();
                ModelLifecycle::Unloaded
            }
        };
        true
    }

    /// Validates the input and appends the outgoing user message.
    pub fn begin_send(&mut self, input: &str) -> Result<SendRequest, ValidationError> {
        let text = input.trim();
        if text.is_empty() {
            return Err(ValidationError::EmptyMessage);
        }
        if !self.lifecycle.is_loaded() {
            return Err(ValidationError::ModelNotLoaded);
        }
        let ticket = self.ticket().ok_or(ValidationError::NoActiveConversation)?;
        let model = self
            .selected_model
            .clone()
            .ok_or(ValidationError::NoModelSelected)?;

        self.next_request_id += 1;
        let request_id = self.next_request_id;
        self.messages.push(
            Message::user(text)
                .with_timestamp(Utc::now())
                .for_request(request_id),
        );
        self.pending_sends += 1;

        Ok(SendRequest {
            ticket,
            request_id,
            model,
            device: self.device,
            text: text.to_string(),
        })
    }

    /// Inserts the reply, or an error message, directly after the message it
    /// answers.
    pub fn finish_send(
        &mut self,
        request: &SendRequest,
        outcome: Result<ChatReply, TransportError>,
    ) -> bool {
        if !self.is_current(&request.ticket) {
            return false;
        }
        self.pending_sends = self.pending_sends.saturating_sub(1);

        let reply = match outcome {
            Ok(reply) => Message::assistant(reply.text).with_metrics(reply.metrics),
            Err(err) => Message::assistant(format!("Error: {err}")),
        }
        .with_timestamp(Utc::now())
        .for_request(request.request_id);

        let Some(position) = self.messages.iter().position(|message| {
            message.request_id == Some(request.request_id) && message.sender == Sender::User
        }) else {
            // The prompt was cleared by an unload while the reply was pending.
            debug!(
                chat_id = %request.ticket.chat_id,
                request_id = request.request_id,
                "session: dropping reply for cleared message"
            );
            return false;
        };
        self.messages.insert(position + 1, reply);
        true
    }
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
