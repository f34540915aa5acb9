use battle_core::CommandError;

/// Errors surfaced to runtime clients.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuntimeError {
    /// The engine refused the command; the battle state is unchanged.
    #[error("command rejected: {0}")]
    Rejected(#[from] CommandError),

    /// The worker task is gone, so no further commands can be served.
    #[error("battle worker is no longer running")]
    WorkerGone,
}

pub type Result<T> = std::result::Result<T, RuntimeError>;
