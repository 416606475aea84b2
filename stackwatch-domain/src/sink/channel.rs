use super::EventSink;
use crate::{
    error::{WatchError, WatchResult as Result},
    event::WatchEvent,
};
use async_trait::async_trait;
use futures_core::Stream;
use futures_core::stream::BoxStream;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::{ReceiverStream, UnboundedReceiverStream};
use tokio_util::sync::CancellationToken;

/// channel 缓冲策略，需显式选择
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamBuffer {
    /// 有界缓冲：缓冲满时轮询任务等待消费者（生产者背压）
    Bounded(usize),
    /// 无界缓冲：轮询任务从不等待消费者
    Unbounded,
}

enum Tx {
    Bounded(mpsc::Sender<Result<WatchEvent>>),
    Unbounded(mpsc::UnboundedSender<Result<WatchEvent>>),
}

/// 写入 channel 的 sink；会话失败时把最终错误作为最后一项写入
pub struct ChannelSink {
    tx: Tx,
}

impl ChannelSink {
    pub fn channel(buffer: StreamBuffer) -> (Self, BoxStream<'static, Result<WatchEvent>>) {
        match buffer {
            StreamBuffer::Bounded(capacity) => {
                let (tx, rx) = mpsc::channel(capacity.max(1));
                let sink = Self { tx: Tx::Bounded(tx) };
                (sink, ReceiverStream::new(rx).boxed())
            }
            StreamBuffer::Unbounded => {
                let (tx, rx) = mpsc::unbounded_channel();
                let sink = Self {
                    tx: Tx::Unbounded(tx),
                };
                (sink, UnboundedReceiverStream::new(rx).boxed())
            }
        }
    }

    async fn send(&self, item: Result<WatchEvent>) -> Result<()> {
        match &self.tx {
            Tx::Bounded(tx) => tx.send(item).await.map_err(|_| WatchError::SinkClosed),
            Tx::Unbounded(tx) => tx.send(item).map_err(|_| WatchError::SinkClosed),
        }
    }

    /// 结束投递：失败时写入最终错误，随后关闭 channel
    pub async fn finish(self, result: Result<()>) {
        if let Err(err) = result {
            let _ = self.send(Err(err)).await;
        }
    }
}

#[async_trait]
impl EventSink for ChannelSink {
    async fn deliver(&mut self, event: WatchEvent) -> Result<()> {
        self.send(Ok(event)).await
    }
}

/// 异步事件流：按时间顺序产出事件，会话失败时最后一项为错误，成功时直接结束。
/// 丢弃即取消对应会话。
pub struct WatchStream {
    inner: BoxStream<'static, Result<WatchEvent>>,
    token: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl WatchStream {
    pub(crate) fn new(
        inner: BoxStream<'static, Result<WatchEvent>>,
        token: CancellationToken,
        task: JoinHandle<()>,
    ) -> Self {
        Self {
            inner,
            token,
            task: Some(task),
        }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// 等待后台会话结束（不消费剩余事件）
    pub async fn join(mut self) {
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Stream for WatchStream {
    type Item = Result<WatchEvent>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}

impl Drop for WatchStream {
    fn drop(&mut self) {
        self.cancel();
    }
}
