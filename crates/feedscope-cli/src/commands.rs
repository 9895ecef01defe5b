/// Result of processing a slash command in the chat loop.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandResult {
    /// Display a message to the user.
    Message(String),
    /// Clear the current session's history.
    Clear,
    /// Print the current session's history.
    ShowHistory,
    /// Drop the current session and start a new one.
    NewSession,
    /// Show data and session status.
    ShowStatus,
    Quit,
    /// Not a command - treat as a question.
    NotACommand,
}

pub fn handle_command(input: &str) -> CommandResult {
    let input = input.trim();
    let cmd = input.split_whitespace().next().unwrap_or("");

    match cmd {
        "/help" | "/h" => show_help(),
        "/exit" | "/quit" | "/q" => CommandResult::Quit,
        "/clear" => CommandResult::Clear,
        "/history" => CommandResult::ShowHistory,
        "/new" => CommandResult::NewSession,
        "/status" => CommandResult::ShowStatus,
        "/version" => CommandResult::Message(format!("feedscope v{}", env!("CARGO_PKG_VERSION"))),
        _ => {
            if input.starts_with('/') {
                CommandResult::Message(format!("Unknown command: {cmd}. Type /help for commands."))
            } else {
                CommandResult::NotACommand
            }
        }
    }
}

fn show_help() -> CommandResult {
    let help_text = "\
feedscope chat commands

  /history            Show this session's messages
  /clear              Clear this session's history
  /new                Start a fresh session
  /status             Show loaded data and session info
  /version            Show version information
  /help, /h           Show this help message
  /exit, /quit, /q    Quit

Anything else is sent as a question.";

    CommandResult::Message(help_text.into())
}
