//! 取消信号（CancelSignal）
//!
//! 把调用方的 `CancellationToken` 与可选截止时间合并为一个信号：
//! 超时只是由截止时间派生的取消，不是另一套机制。
//!
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;

/// 取消来源
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelCause {
    Requested,
    Deadline,
}

impl fmt::Display for CancelCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Requested => write!(f, "requested by caller"),
            Self::Deadline => write!(f, "deadline exceeded"),
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct CancelSignal {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl CancelSignal {
    pub(crate) fn new(token: CancellationToken, timeout: Option<Duration>) -> Self {
        Self {
            token,
            deadline: timeout.map(|t| Instant::now() + t),
        }
    }

    /// 非阻塞检查，在每轮迭代开始时调用
    pub(crate) fn check(&self) -> Result<(), CancelCause> {
        if self.token.is_cancelled() {
            return Err(CancelCause::Requested);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(CancelCause::Deadline),
            _ => Ok(()),
        }
    }

    pub(crate) async fn fired(&self) -> CancelCause {
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    _ = self.token.cancelled() => CancelCause::Requested,
                    _ = time::sleep_until(deadline) => CancelCause::Deadline,
                }
            }
            None => {
                self.token.cancelled().await;
                CancelCause::Requested
            }
        }
    }

    /// 以取消信号为界驱动 future；信号先到则丢弃 future
    pub(crate) async fn guard<F: Future>(&self, fut: F) -> Result<F::Output, CancelCause> {
        tokio::select! {
            biased;
            cause = self.fired() => Err(cause),
            out = fut => Ok(out),
        }
    }

    pub(crate) async fn sleep(&self, duration: Duration) -> Result<(), CancelCause> {
        self.guard(time::sleep(duration)).await
    }
}
