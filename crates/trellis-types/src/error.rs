//! Error types shared across all Trellis crates.

/// Errors that can occur across the Trellis runtime.
///
/// Variants split into two classes with different propagation policies:
/// user errors (`NotLinked`, `AlreadyLinked`, `InvalidCode`,
/// `HandleMismatch`, `InsufficientFunds`) are caught at the command-handler
/// boundary and turned into a plain-text reply; structural errors
/// (`UnsupportedSource`, `Persistence`) propagate out of the handler and
/// surface loudly. See [`BotError::is_user_error`].
#[derive(Debug, thiserror::Error)]
pub enum BotError {
    /// An economy operation was attempted by a user with no resolved
    /// canonical id.
    #[error("this command requires a linked account")]
    NotLinked,

    /// A link was attempted for a source that already has a mapping.
    #[error("this account is already linked")]
    AlreadyLinked,

    /// A link completion was attempted with an unknown or superseded code.
    #[error("invalid link code")]
    InvalidCode,

    /// A link code was presented by a Twitch handle other than the one it
    /// was issued for. The code is not consumed.
    #[error("link code was issued for a different Twitch handle")]
    HandleMismatch,

    /// A purchase or spend would leave the balance negative.
    #[error("insufficient funds: need {needed}, have {available}")]
    InsufficientFunds { needed: u64, available: u64 },

    /// A command context was constructed from an unrecognized invocation
    /// shape. Programmer/configuration error, never expected at runtime
    /// once all platforms are wired in. Must not be caught and hidden.
    #[error("unsupported command source: {0}")]
    UnsupportedSource(String),

    /// The durable store could not be written. The backup-restore
    /// procedure has already run by the time this surfaces.
    #[error("persistence failure: {0}")]
    Persistence(String),

    /// A platform API call failed (collaborator boundary).
    #[error("platform API error: {0}")]
    Platform(String),

    /// An HTTP call to a platform API failed at the transport level.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Bad or missing configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

impl BotError {
    /// Whether this error is a validation-class user error that should be
    /// rendered as a plain-text reply instead of propagating.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            BotError::NotLinked
                | BotError::AlreadyLinked
                | BotError::InvalidCode
                | BotError::HandleMismatch
                | BotError::InsufficientFunds { .. }
        )
    }
}
