use feedscope_cli::commands::{handle_command, CommandResult};

#[test]
fn test_help_lists_commands() {
    let CommandResult::Message(msg) = handle_command("/help") else {
        panic!("expected help text");
    };
    assert!(msg.contains("/history"));
    assert!(msg.contains("/clear"));
    assert_eq!(handle_command("/h"), CommandResult::Message(msg));
}

#[test]
fn test_quit_aliases() {
    for cmd in ["/exit", "/quit", "/q"] {
        assert_eq!(handle_command(cmd), CommandResult::Quit);
    }
}

#[test]
fn test_session_commands() {
    assert_eq!(handle_command("/clear"), CommandResult::Clear);
    assert_eq!(handle_command("/history"), CommandResult::ShowHistory);
    assert_eq!(handle_command("/new"), CommandResult::NewSession);
    assert_eq!(handle_command("/status"), CommandResult::ShowStatus);
}

#[test]
fn test_surrounding_whitespace_ignored() {
    assert_eq!(handle_command("  /clear  "), CommandResult::Clear);
}

#[test]
fn test_unknown_slash_command() {
    match handle_command("/launch") {
        CommandResult::Message(msg) => assert!(msg.contains("Unknown command: /launch")),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn test_plain_text_is_a_question() {
    assert_eq!(
        handle_command("Which PAC feeds run H265?"),
        CommandResult::NotACommand
    );
    // a slash inside the text does not make it a command
    assert_eq!(handle_command("EO/IR feeds?"), CommandResult::NotACommand);
}

#[test]
fn test_version() {
    match handle_command("/version") {
        CommandResult::Message(msg) => assert!(msg.starts_with("feedscope v")),
        other => panic!("unexpected {other:?}"),
    }
}
