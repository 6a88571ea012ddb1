use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Failure category of a device command. Mapping these to user-facing text
/// is left to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommandErrorCode {
    #[serde(rename = "VALIDATION_ERROR")]
    Validation,
    #[serde(rename = "NETWORK_ERROR")]
    Network,
    #[serde(rename = "API_ERROR")]
    Api,
}

impl CommandErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommandErrorCode::Validation => "VALIDATION_ERROR",
            CommandErrorCode::Network => "NETWORK_ERROR",
            CommandErrorCode::Api => "API_ERROR",
        }
    }
}

impl fmt::Display for CommandErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{code}: {message}")]
pub struct CommandError {
    pub code: CommandErrorCode,
    pub message: String,
}

impl CommandError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self { code: CommandErrorCode::Validation, message: message.into() }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self { code: CommandErrorCode::Network, message: message.into() }
    }

    pub fn api(message: impl Into<String>) -> Self {
        Self { code: CommandErrorCode::Api, message: message.into() }
    }
}
