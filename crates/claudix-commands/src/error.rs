use thiserror::Error;

/// Errors that can occur in the command registry
#[derive(Error, Debug)]
pub enum CommandError {
    #[error("Command already registered: {0}")]
    DuplicateCommand(String),

    #[error("Command not found: {0}")]
    NotFound(String),

    #[error("Invalid command id: {0}")]
    InvalidCommandId(String),

    #[error("Invalid arguments for {command}: {message}")]
    InvalidArguments { command: String, message: String },

    #[error("Command {command} has no method {method}")]
    UnknownMethod { command: String, method: String },

    #[error("Command {command} returned {actual}, expected {expected}")]
    InvalidReturn {
        command: String,
        expected: String,
        actual: String,
    },

    #[error("Command handler failed: {0}")]
    Handler(String),
}

impl CommandError {
    /// Create an invalid-arguments error
    pub fn invalid_arguments(command: impl Into<String>, message: impl Into<String>) -> Self {
        CommandError::InvalidArguments {
            command: command.into(),
            message: message.into(),
        }
    }

    /// Create a handler failure
    pub fn handler(message: impl Into<String>) -> Self {
        CommandError::Handler(message.into())
    }
}

pub type Result<T> = std::result::Result<T, CommandError>;
