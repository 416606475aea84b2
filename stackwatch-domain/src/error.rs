//! 监视会话统一错误定义
//!
//! 按错误的处置方式分类：
//! - `Source`：事件源的传输/鉴权/限流故障，会话内按退避重试，耗尽后才致命；
//! - `OperationFailed`：被监视的操作本身进入失败终态，原因取自控制面事件原文；
//! - `PolicyAmbiguity`：终态判定时找不到或找到多个候选部署；
//! - `Cancelled`：调用方取消或截止时间到达，既不是成功也不是失败。
//!
use crate::cancel::CancelCause;
use std::fmt;
use thiserror::Error;

/// 事件源故障的细分类型（仅用于日志与审计，均可重试）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceErrorKind {
    Transport,
    Unauthorized,
    Throttled,
}

impl fmt::Display for SourceErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport => write!(f, "transport"),
            Self::Unauthorized => write!(f, "unauthorized"),
            Self::Throttled => write!(f, "throttled"),
        }
    }
}

/// 统一错误类型
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum WatchError {
    #[error("event source error ({kind}): {reason}")]
    Source {
        kind: SourceErrorKind,
        reason: String,
    },

    /// Display 即控制面给出的原因本身，不加任何前缀
    #[error("{reason}")]
    OperationFailed { reason: String },

    #[error("policy ambiguity: deployment={deployment_id}, matches={matches}")]
    PolicyAmbiguity { deployment_id: String, matches: usize },

    #[error("cancelled: {cause}")]
    Cancelled { cause: CancelCause },

    #[error("event sink closed")]
    SinkClosed,

    #[error("invalid config: {reason}")]
    InvalidConfig { reason: String },
}

impl WatchError {
    pub fn transport(reason: impl Into<String>) -> Self {
        Self::Source {
            kind: SourceErrorKind::Transport,
            reason: reason.into(),
        }
    }

    pub fn throttled(reason: impl Into<String>) -> Self {
        Self::Source {
            kind: SourceErrorKind::Throttled,
            reason: reason.into(),
        }
    }

    pub fn unauthorized(reason: impl Into<String>) -> Self {
        Self::Source {
            kind: SourceErrorKind::Unauthorized,
            reason: reason.into(),
        }
    }

    pub fn operation_failed(reason: impl Into<String>) -> Self {
        Self::OperationFailed {
            reason: reason.into(),
        }
    }

    /// 是否为可在会话内重试的事件源故障
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Source { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

impl From<CancelCause> for WatchError {
    fn from(cause: CancelCause) -> Self {
        Self::Cancelled { cause }
    }
}

/// 统一 Result 类型别名
pub type WatchResult<T> = Result<T, WatchError>;
