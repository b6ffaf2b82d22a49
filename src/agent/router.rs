//! Message routing for explicit slash commands.
//!
//! Free text is left to the LLM action selector.

use crate::channels::IncomingMessage;

/// Intent extracted from a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageIntent {
    /// Show available commands.
    Help,
    /// List registered actions.
    ListActions,
    /// Forget the room's conversation log.
    Clear,
    /// Leave the session.
    Quit,
    /// Run an action by name, simile or unambiguous fragment.
    Invoke { token: String, args: String },
    /// Free text for the action selector.
    Chat { content: String },
}

const COMMAND_PREFIX: char = '/';

/// Routes slash commands.
#[derive(Debug, Clone, Default)]
pub struct Router;

impl Router {
    pub fn new() -> Self {
        Self
    }

    pub fn route(&self, message: &IncomingMessage) -> MessageIntent {
        let content = message.content.trim();
        match content.strip_prefix(COMMAND_PREFIX) {
            Some(command) => self.parse_command(command),
            None => MessageIntent::Chat {
                content: content.to_string(),
            },
        }
    }

    fn parse_command(&self, command: &str) -> MessageIntent {
        let (head, args) = match command.split_once(char::is_whitespace) {
            Some((head, rest)) => (head, rest.trim()),
            None => (command, ""),
        };

        match head.to_lowercase().as_str() {
            "help" | "?" => MessageIntent::Help,
            "actions" => MessageIntent::ListActions,
            "clear" => MessageIntent::Clear,
            "quit" | "exit" => MessageIntent::Quit,
            _ => MessageIntent::Invoke {
                token: head.to_string(),
                args: args.to_string(),
            },
        }
    }
}
