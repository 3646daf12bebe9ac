//! Error types for the timer.

use thiserror::Error;

/// Result type for timer operations.
pub type TimerResult<T> = Result<T, TimerError>;

/// Errors that can occur when driving the timer.
#[derive(Debug, Error)]
pub enum TimerError {
    /// A wall-clock target string did not parse as `HH:MM:SS`.
    #[error("invalid target time: {input:?}")]
    InvalidTargetTime {
        /// The rejected input.
        input: String,
    },

    /// The command name was not recognized.
    #[error("unknown timer action: {action:?}")]
    UnknownAction {
        /// The rejected action.
        action: String,
    },
}

impl TimerError {
    /// Creates an invalid-target-time error.
    pub fn invalid_target(input: impl Into<String>) -> Self {
        Self::InvalidTargetTime {
            input: input.into(),
        }
    }

    /// Creates an unknown-action error.
    pub fn unknown_action(action: impl Into<String>) -> Self {
        Self::UnknownAction {
            action: action.into(),
        }
    }
}
