use sharc_runtime::RuntimeError;

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("{0}")]
    Usage(String),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// 2 for bad invocations, 1 for everything that failed at runtime.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Usage(_) | Self::Runtime(RuntimeError::Config(_)) => 2,
            _ => 1,
        }
    }
}
