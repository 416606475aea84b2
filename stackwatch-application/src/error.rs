use stackwatch_domain::error::WatchError;

/// 进程退出码
pub mod exit {
    pub const SUCCESS: i32 = 0;
    pub const OPERATION_FAILED: i32 = 1;
    pub const SOURCE: i32 = 2;
    pub const AMBIGUOUS: i32 = 3;
    pub const USAGE: i32 = 4;
    pub const CANCELLED: i32 = 130;
}

#[non_exhaustive]
#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Watch(#[from] WatchError),

    #[error("validation: {0}")]
    Validation(String),

    #[error("already watching: target={target}")]
    AlreadyWatching { target: String },

    #[error("not watching: target={target}")]
    NotWatching { target: String },
}

impl AppError {
    pub fn exit_code(&self) -> i32 {
        match self {
            AppError::Watch(err) => match err {
                WatchError::OperationFailed { .. } | WatchError::SinkClosed => {
                    exit::OPERATION_FAILED
                }
                WatchError::Source { .. } => exit::SOURCE,
                WatchError::PolicyAmbiguity { .. } => exit::AMBIGUOUS,
                WatchError::Cancelled { .. } => exit::CANCELLED,
                WatchError::InvalidConfig { .. } => exit::USAGE,
                _ => exit::OPERATION_FAILED,
            },
            AppError::Validation(_)
            | AppError::AlreadyWatching { .. }
            | AppError::NotWatching { .. } => exit::USAGE,
        }
    }
}

/// 把会话结果映射为进程退出码
pub fn exit_code(result: &Result<(), AppError>) -> i32 {
    match result {
        Ok(()) => exit::SUCCESS,
        Err(err) => err.exit_code(),
    }
}
