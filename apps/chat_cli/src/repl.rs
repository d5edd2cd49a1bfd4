//! Interactive session on top of [`ChatClient`]. Toggles and sends run as
//! background tasks so the prompt stays responsive; everything they change
//! is printed from the client's event stream.

use std::sync::Arc;

use anyhow::Result;
use client_core::{ChatClient, ClientEvent, Message, NoticeLevel, SessionSnapshot};
use shared::domain::{ChatId, Device};
use tokio::{
    io::{self, AsyncBufReadExt, BufReader},
    sync::broadcast::{self, error::RecvError},
};
use tracing::debug;

use crate::render;

pub const HELP: &str = "\
commands:
  /new             start a new conversation
  /open <id>       open an existing conversation
  /chats           list conversations
  /models          refresh the model catalog
  /model <name>    select a model
  /device <d>      select a device (auto, cpu, gpu)
  /toggle          load or unload the selected model
  /status          show the current session
  /help            show this help
  /quit            exit
anything else is sent as a message";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    New,
    Open(ChatId),
    Chats,
    Models,
    Model(String),
    Device(Device),
    Toggle,
    Status,
    Help,
    Quit,
    Send(String),
    Empty,
    Invalid(String),
}

pub fn parse_command(line: &str) -> ReplCommand {
    let line = line.trim();
    if line.is_empty() {
        return ReplCommand::Empty;
    }
    let Some(command) = line.strip_prefix('/') else {
        return ReplCommand::Send(line.to_string());
    };

    let (name, arg) = match command.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (command, ""),
    };
    match (name, arg) {
        ("new", "") => ReplCommand::New,
        ("open", "") => ReplCommand::Invalid("usage: /open <id>".into()),
        ("open", id) => ReplCommand::Open(ChatId::from(id)),
        ("chats", "") => ReplCommand::Chats,
        ("models", "") => ReplCommand::Models,
        ("model", "") => ReplCommand::Invalid("usage: /model <name>".into()),
        ("model", model) => ReplCommand::Model(model.to_string()),
        ("device", device) => match device.parse::<Device>() {
            Ok(device) => ReplCommand::Device(device),
            Err(err) => ReplCommand::Invalid(err.to_string()),
        },
        ("toggle", "") => ReplCommand::Toggle,
        ("status", "") => ReplCommand::Status,
        ("help", "") => ReplCommand::Help,
        ("quit" | "exit", "") => ReplCommand::Quit,
        _ => ReplCommand::Invalid(format!("unknown command '/{command}', try /help")),
    }
}

pub struct ReplOptions {
    pub chat: Option<ChatId>,
    pub model: Option<String>,
    pub device: Option<Device>,
}

pub async fn run(client: Arc<ChatClient>, options: ReplOptions) -> Result<()> {
    let printer = tokio::spawn(print_events(client.subscribe_events()));

    client.initialize(options.chat).await;
    if let Some(model) = options.model {
        client.select_model(model).await;
    }
    if let Some(device) = options.device {
        client.select_device(device).await;
    }
    if client.snapshot().await.active.is_none() {
        client.create_conversation().await;
    }
    println!("{HELP}");

    let mut lines = BufReader::new(io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match parse_command(&line) {
            ReplCommand::Empty => {}
            ReplCommand::Quit => break,
            ReplCommand::Help => println!("{HELP}"),
            ReplCommand::Invalid(reason) => println!("{reason}"),
            ReplCommand::New => {
                let chat_id = client.create_conversation().await;
                println!("new conversation {chat_id}");
            }
            ReplCommand::Open(chat_id) => client.open_conversation(chat_id).await,
            ReplCommand::Chats => {
                for conversation in client.refresh_conversations().await {
                    println!("{}", render::conversation_line(&conversation));
                }
            }
            ReplCommand::Models => {
                let models = client.refresh_models().await;
                let selected = client.snapshot().await.selected_model;
                for model in models {
                    let marker = if selected.as_deref() == Some(model.as_str()) {
                        "*"
                    } else {
                        " "
                    };
                    println!("{marker} {model}");
                }
            }
            ReplCommand::Model(model) => client.select_model(model).await,
            ReplCommand::Device(device) => client.select_device(device).await,
            ReplCommand::Status => println!("{}", render::snapshot_summary(&client.snapshot().await)),
            ReplCommand::Toggle => {
                let client = client.clone();
                tokio::spawn(async move {
                    if let Err(err) = client.toggle_model().await {
                        if err.is_validation() {
                            println!("{err}");
                        }
                    }
                });
            }
            ReplCommand::Send(text) => {
                let client = client.clone();
                tokio::spawn(async move {
                    if let Err(err) = client.send_message(&text).await {
                        if err.is_validation() {
                            println!("{err}");
                        }
                    }
                });
            }
        }
    }

    printer.abort();
    Ok(())
}

async fn print_events(mut events: broadcast::Receiver<ClientEvent>) {
    let mut printer = LogPrinter::default();
    loop {
        match events.recv().await {
            Ok(ClientEvent::SessionChanged(snapshot)) => {
                for line in printer.update(&snapshot) {
                    println!("{line}");
                }
            }
            Ok(ClientEvent::Notice(notice)) => {
                let marker = match notice.level {
                    NoticeLevel::Info => "*",
                    NoticeLevel::Warning => "!",
                    NoticeLevel::Error => "!!",
                };
                println!("{marker} {}", notice.text);
            }
            Ok(ClientEvent::ConversationsUpdated(_) | ClientEvent::CatalogUpdated(_)) => {}
            Err(RecvError::Lagged(skipped)) => debug!(skipped, "repl: event printer lagged"),
            Err(RecvError::Closed) => break,
        }
    }
}

/// Tracks what has already been printed for the active conversation so each
/// snapshot only prints the messages it adds.
#[derive(Debug, Default)]
pub struct LogPrinter {
    active: Option<ChatId>,
    printed: Vec<Message>,
    thinking: bool,
}

impl LogPrinter {
    pub fn update(&mut self, snapshot: &SessionSnapshot) -> Vec<String> {
        let mut lines = Vec::new();
        if self.active != snapshot.active {
            self.active = snapshot.active.clone();
            self.printed.clear();
            if let Some(chat_id) = &self.active {
                lines.push(format!("-- conversation {chat_id} --"));
            }
        }

        for message in &snapshot.messages {
            if !self.printed.contains(message) {
                lines.push(render::message_line(message));
            }
        }
        self.printed = snapshot.messages.clone();

        let thinking = snapshot.is_thinking();
        if thinking && !self.thinking {
            lines.push("Bot is thinking...".to_string());
        }
        self.thinking = thinking;
        lines
    }
}

#[cfg(test)]
#[path = "tests/repl_tests.rs"]
mod tests;
