//! 事件投递（EventSink）
//!
//! 轮询核心按时间顺序把新事件逐条交给 sink：
//! - `CallbackSink`：在轮询任务上同步调用回调，回调耗时会阻塞轮询；
//! - `LogSink`：写入 tracing 日志，用于"轮询直到结束"的一次性场景；
//! - `ChannelSink`：写入 channel，由调用方以 `WatchStream` 异步消费（`stream` 特性）。
//!
//! 同一会话只使用一种 sink。事件按值交出，sink 不应修改它们。
//!
#[cfg(feature = "stream")]
mod channel;

#[cfg(feature = "stream")]
pub use channel::{ChannelSink, StreamBuffer, WatchStream};

use crate::{error::WatchResult as Result, event::WatchEvent};
use async_trait::async_trait;

#[async_trait]
pub trait EventSink: Send {
    async fn deliver(&mut self, event: WatchEvent) -> Result<()>;
}

/// 收集到内存，便于测试与批量消费
#[async_trait]
impl EventSink for Vec<WatchEvent> {
    async fn deliver(&mut self, event: WatchEvent) -> Result<()> {
        self.push(event);
        Ok(())
    }
}

/// 同步回调
pub struct CallbackSink<F> {
    callback: F,
}

impl<F> CallbackSink<F>
where
    F: FnMut(WatchEvent) + Send,
{
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

#[async_trait]
impl<F> EventSink for CallbackSink<F>
where
    F: FnMut(WatchEvent) + Send,
{
    async fn deliver(&mut self, event: WatchEvent) -> Result<()> {
        (self.callback)(event);
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct LogSink {
    delivered: usize,
}

impl LogSink {
    pub fn delivered(&self) -> usize {
        self.delivered
    }
}

#[async_trait]
impl EventSink for LogSink {
    async fn deliver(&mut self, event: WatchEvent) -> Result<()> {
        self.delivered += 1;
        tracing::info!(
            subject = event.subject_id(),
            status = event.status(),
            resource_type = event.resource_type().unwrap_or("-"),
            reason = event.reason().unwrap_or(""),
            at = %event.timestamp(),
            "event"
        );
        Ok(())
    }
}
