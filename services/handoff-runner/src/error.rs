//! Error types for the negotiation core

use crate::types::BotIdentity;

/// Failure reported by an outbound platform command
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TransportError {
    #[error("not connected to the platform")]
    Disconnected,

    #[error("no active trade")]
    NoActiveTrade,

    #[error("platform rejected {command}: {reason}")]
    Rejected {
        command: &'static str,
        reason: String,
    },

    #[error("acknowledgment timed out")]
    AckTimeout,
}

impl TransportError {
    pub fn rejected(command: &'static str, reason: impl Into<String>) -> Self {
        TransportError::Rejected {
            command,
            reason: reason.into(),
        }
    }
}

/// Why a negotiation failed or could not proceed
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SessionError {
    #[error("{counterparty} is not an authorized counterparty")]
    AuthorizationDenied { counterparty: BotIdentity },

    #[error("no giving-eligible items")]
    NoEligibleItems,

    #[error("nothing staged, {remaining} eligible items still held")]
    StagingFailure { remaining: usize },

    #[error("ready handshake failed: {0}")]
    ReadyHandshakeFailure(TransportError),

    #[error("accept failed (ambiguous: {ambiguous})")]
    AcceptFailure { ambiguous: bool },

    #[error("trade timed out, {remaining} eligible items still held")]
    Timeout { remaining: usize },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("negotiation cancelled")]
    Cancelled,
}

impl SessionError {
    /// True for the paths that end with the bot being stopped
    pub fn is_fatal(&self) -> bool {
        match self {
            SessionError::NoEligibleItems => true,
            SessionError::StagingFailure { remaining } => *remaining == 0,
            SessionError::Timeout { remaining } => *remaining == 0,
            SessionError::AcceptFailure { ambiguous } => *ambiguous,
            _ => false,
        }
    }
}

/// Errors routing an event to a bot's session actor
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DispatchError {
    #[error("bot {0} is not running")]
    UnknownBot(BotIdentity),

    #[error("bot {0} is already running")]
    AlreadyRunning(BotIdentity),

    #[error("bot {0} has stopped")]
    BotStopped(BotIdentity),
}
