//! Plain-text rendering of client state for the terminal.

use client_core::{ChatStatus, Conversation, Message, ModelLifecycle, SessionSnapshot};

pub fn message_line(message: &Message) -> String {
    let mut line = String::new();
    if let Some(timestamp) = message.timestamp {
        line.push_str(&format!("[{}] ", timestamp.format("%H:%M:%S")));
    }
    line.push_str(&format!("{}: {}", message.sender, message.text));
    if let Some(metrics) = message.metrics {
        line.push_str(&format!("\n    {metrics}"));
    }
    line
}

pub fn conversation_line(conversation: &Conversation) -> String {
    let mut line = format!("{}  {}", conversation.id, conversation.label());
    match (&conversation.model, conversation.device) {
        (Some(model), Some(device)) => line.push_str(&format!("  ({model} on {device})")),
        (Some(model), None) => line.push_str(&format!("  ({model})")),
        _ => {}
    }
    line
}

pub fn status_line(status: &ChatStatus) -> String {
    format!(
        "model: {}  device: {}  loaded: {}",
        status.model.as_deref().unwrap_or("-"),
        status.device,
        if status.loaded { "yes" } else { "no" }
    )
}

pub fn lifecycle_label(lifecycle: ModelLifecycle) -> &'static str {
    match lifecycle {
        ModelLifecycle::Unloaded => "unloaded",
        ModelLifecycle::Loading => "loading...",
        ModelLifecycle::Loaded => "loaded",
        ModelLifecycle::Unloading => "unloading...",
    }
}

pub fn snapshot_summary(snapshot: &SessionSnapshot) -> String {
    let chat = snapshot
        .active
        .as_ref()
        .map(|id| id.as_str())
        .unwrap_or("(none)");
    let mut summary = format!(
        "chat: {chat}\nmodel: {}  device: {}  state: {}",
        snapshot.selected_model.as_deref().unwrap_or("-"),
        snapshot.device,
        lifecycle_label(snapshot.lifecycle),
    );
    if snapshot.toggle_pending && !snapshot.lifecycle.is_in_flight() {
        summary.push_str("\nwaiting on a model load/unload from another conversation");
    }
    if snapshot.is_thinking() {
        summary.push_str(&format!("\npending replies: {}", snapshot.pending_sends));
    }
    summary
}
