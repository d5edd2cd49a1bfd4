use std::{path::PathBuf, sync::Arc};

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use client_core::{ChatBackend, ChatClient, HttpChatBackend};
use shared::domain::{ChatId, Device};
use tracing_subscriber::EnvFilter;

mod config;
mod render;
mod repl;

const DEFAULT_LOG_FILTER: &str = "info";

#[derive(Parser, Debug)]
#[command(about = "Terminal client for a local LLM chat backend")]
struct Cli {
    /// Backend base URL; overrides the config file and environment.
    #[arg(long)]
    api_url: Option<String>,
    /// Config file to read instead of ./chat_client.toml.
    #[arg(long)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the models the backend can load.
    Models,
    /// List known conversations.
    Chats,
    History {
        chat_id: String,
    },
    Status {
        chat_id: String,
    },
    Load {
        chat_id: String,
        #[arg(long)]
        model: String,
        #[arg(long, default_value_t = Device::Auto)]
        device: Device,
    },
    Unload {
        chat_id: String,
        #[arg(long)]
        model: String,
        #[arg(long, default_value_t = Device::Auto)]
        device: Device,
    },
    Send {
        chat_id: String,
        #[arg(long)]
        model: String,
        #[arg(long, default_value_t = Device::Auto)]
        device: Device,
        #[arg(required = true)]
        text: Vec<String>,
    },
    /// Delete every stored message on the backend.
    ClearAll,
    /// Interactive session (the default).
    Repl {
        #[arg(long)]
        chat: Option<String>,
        #[arg(long)]
        model: Option<String>,
        #[arg(long)]
        device: Option<Device>,
    },
}

fn log_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(log_filter())
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();

    let mut settings = config::load_settings(cli.config.as_deref())?;
    if let Some(api_url) = &cli.api_url {
        settings.api_url = config::parse_api_url(api_url)?;
    }
    tracing::debug!(api_url = %settings.api_url, "config: resolved settings");

    let backend = HttpChatBackend::new(settings.backend_config());
    let command = cli.command.unwrap_or(Command::Repl {
        chat: None,
        model: None,
        device: None,
    });

    match command {
        Command::Models => {
            for model in backend.list_models().await? {
                println!("{model}");
            }
        }
        Command::Chats => {
            for conversation in backend.list_conversations().await? {
                println!("{}", render::conversation_line(&conversation));
            }
        }
        Command::History { chat_id } => {
            for message in backend.fetch_history(&ChatId::from(chat_id)).await? {
                println!("{}", render::message_line(&message));
            }
        }
        Command::Status { chat_id } => {
            let status = backend.fetch_status(&ChatId::from(chat_id)).await?;
            println!("{}", render::status_line(&status));
        }
        Command::Load {
            chat_id,
            model,
            device,
        } => {
            backend
                .set_model_loaded(&ChatId::from(chat_id), &model, device, true)
                .await?;
            println!("Loaded {model} on {device}");
        }
        Command::Unload {
            chat_id,
            model,
            device,
        } => {
            backend
                .set_model_loaded(&ChatId::from(chat_id), &model, device, false)
                .await?;
            println!("Unloaded {model}");
        }
        Command::Send {
            chat_id,
            model,
            device,
            text,
        } => {
            let text = text.join(" ");
            let text = text.trim();
            if text.is_empty() {
                bail!("message is empty");
            }
            let reply = backend
                .send_message(&ChatId::from(chat_id), &model, device, text)
                .await?;
            println!("{}", reply.text);
            if let Some(metrics) = reply.metrics {
                println!("{metrics}");
            }
        }
        Command::ClearAll => {
            backend.clear_all().await?;
            println!("all messages cleared");
        }
        Command::Repl {
            chat,
            model,
            device,
        } => {
            let client = ChatClient::new(Arc::new(backend));
            repl::run(
                client,
                repl::ReplOptions {
                    chat: chat.map(ChatId::from),
                    model,
                    device,
                },
            )
            .await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_log_filter_is_info() {
        assert_eq!(EnvFilter::new(DEFAULT_LOG_FILTER).to_string(), "info");
    }

    #[test]
    fn no_subcommand_means_repl() {
        let cli = Cli::try_parse_from(["chat_cli", "--api-url", "http://localhost:9000"])
            .expect("cli");
        assert!(cli.command.is_none());
        assert_eq!(cli.api_url.as_deref(), Some("http://localhost:9000"));
    }

    #[test]
    fn send_takes_model_device_and_words() {
        let cli = Cli::try_parse_from([
            "chat_cli", "send", "c1", "--model", "m1", "--device", "GPU", "hello", "there",
        ])
        .expect("cli");
        match cli.command {
            Some(Command::Send {
                chat_id,
                model,
                device,
                text,
            }) => {
                assert_eq!(chat_id, "c1");
                assert_eq!(model, "m1");
                assert_eq!(device, Device::Gpu);
                assert_eq!(text, vec!["hello".to_string(), "there".to_string()]);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
