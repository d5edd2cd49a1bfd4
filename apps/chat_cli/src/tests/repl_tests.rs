use client_core::ModelLifecycle;

use super::*;

fn snapshot(active: Option<&str>, messages: Vec<Message>, pending_sends: usize) -> SessionSnapshot {
    SessionSnapshot {
        active: active.map(ChatId::from),
        messages,
        catalog: vec!["m1".into()],
        selected_model: Some("m1".into()),
        device: Device::Auto,
        lifecycle: ModelLifecycle::Loaded,
        toggle_pending: false,
        pending_sends,
    }
}

#[test]
fn plain_lines_are_sent_trimmed() {
    assert_eq!(parse_command("  hello there "), ReplCommand::Send("hello there".into()));
    assert_eq!(parse_command("   "), ReplCommand::Empty);
}

#[test]
fn slash_commands_parse_arguments() {
    assert_eq!(parse_command("/new"), ReplCommand::New);
    assert_eq!(parse_command("/open abc-123"), ReplCommand::Open(ChatId::from("abc-123")));
    assert_eq!(parse_command("/model  llama 3 "), ReplCommand::Model("llama 3".into()));
    assert_eq!(parse_command("/device GPU"), ReplCommand::Device(Device::Gpu));
    assert_eq!(parse_command("/toggle"), ReplCommand::Toggle);
    assert_eq!(parse_command("/status"), ReplCommand::Status);
    assert_eq!(parse_command("/chats"), ReplCommand::Chats);
    assert_eq!(parse_command("/models"), ReplCommand::Models);
    assert_eq!(parse_command("/help"), ReplCommand::Help);
    assert_eq!(parse_command("/quit"), ReplCommand::Quit);
}

#[test]
fn malformed_commands_are_reported_not_sent() {
    assert!(matches!(parse_command("/open"), ReplCommand::Invalid(_)));
    assert!(matches!(parse_command("/model"), ReplCommand::Invalid(_)));
    assert!(matches!(parse_command("/device tpu"), ReplCommand::Invalid(_)));
    assert!(matches!(parse_command("/frobnicate"), ReplCommand::Invalid(_)));
    assert!(matches!(parse_command("/toggle now"), ReplCommand::Invalid(_)));
}

#[test]
fn printer_prints_only_new_messages() {
    let mut printer = LogPrinter::default();
    let prompt = Message::user("hi");
    let reply = Message::assistant("hello");

    assert_eq!(
        printer.update(&snapshot(Some("a"), vec![prompt.clone()], 1)),
        vec![
            "-- conversation a --".to_string(),
            "You: hi".to_string(),
            "Bot is thinking...".to_string(),
        ]
    );
    assert_eq!(
        printer.update(&snapshot(Some("a"), vec![prompt, reply], 0)),
        vec!["Bot: hello".to_string()]
    );
}

#[test]
fn printer_restarts_on_conversation_switch() {
    let mut printer = LogPrinter::default();
    let message = Message::user("same text");
    printer.update(&snapshot(Some("a"), vec![message.clone()], 0));

    assert_eq!(
        printer.update(&snapshot(Some("b"), vec![message], 0)),
        vec![
            "-- conversation b --".to_string(),
            "You: same text".to_string(),
        ]
    );
}

#[test]
fn cleared_log_prints_nothing() {
    let mut printer = LogPrinter::default();
    printer.update(&snapshot(Some("a"), vec![Message::user("hi")], 0));
    assert!(printer.update(&snapshot(Some("a"), Vec::new(), 0)).is_empty());
}
