use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlayerError {
    #[error("Unrecognized media reference: {0}")]
    ReferenceInvalid(String),

    #[error("Timed out provisioning {dependency} after {timeout_ms}ms")]
    BootstrapTimeout {
        dependency: String,
        timeout_ms: u64,
    },

    #[error("Failed to load {dependency}: {reason}")]
    BootstrapLoadFailure { dependency: String, reason: String },

    #[error("Playback error: {0}")]
    BackendRuntime(String),

    #[error("Autoplay rejected: {0}")]
    AutoplayRejected(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl PlayerError {
    /// Errors that put the session into its terminal errored state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PlayerError::BootstrapTimeout { .. }
                | PlayerError::BootstrapLoadFailure { .. }
                | PlayerError::BackendRuntime(_)
        )
    }
}

pub type PlayerResult<T> = std::result::Result<T, PlayerError>;
