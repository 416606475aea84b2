//! 轮询核心（Poller）
//!
//! 一个会话绑定一个事件源与一个终态策略，按固定间隔循环：
//! 抓取 → 按时间排序 → 高水位过滤 → 投递 → 终态判定。
//!
//! 状态流转：`POLLING → (DELIVERING)* → POLLING → … → 成功 | 失败(reason) | 中止(source error) | 取消`。
//!
//! - 同一批次的事件全部投递完之后才做终态判定，观察到结束的消费者已经看过导致结束的全部事件；
//! - 只有 `subject_id == target_id` 的事件参与判定，子资源事件只投递不判定；
//! - 事件源故障在会话内按退避重试，连续失败超过上限才中止；
//! - 每轮开始、等待事件源、投递与休眠期间都会响应取消信号。
//!
use crate::{
    cancel::CancelSignal,
    config::{PollerConfig, RetryPolicy},
    error::{WatchError, WatchResult as Result},
    event::WatchEvent,
    mark::HighWaterMark,
    operation::Operation,
    policy::{TerminalPolicy, Verdict},
    sink::{EventSink, LogSink},
    source::EventSource,
};
use bon::Builder;
use std::{sync::Arc, time::Duration};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[cfg(feature = "stream")]
use crate::sink::{ChannelSink, StreamBuffer, WatchStream};

#[derive(Builder)]
pub struct Poller {
    operation: Operation,
    source: Arc<dyn EventSource>,
    policy: Box<dyn TerminalPolicy>,
    #[builder(default)]
    config: PollerConfig,
    #[builder(default)]
    cancel_token: CancellationToken,
}

impl Poller {
    pub fn operation(&self) -> &Operation {
        &self.operation
    }

    /// 用于从外部取消本会话
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    /// 驱动会话直到终态：成功返回 `Ok(())`，失败返回 `OperationFailed`（原因原样保留），
    /// 取消返回 `Cancelled`，事件源重试耗尽返回最后一次的 `Source` 错误。
    #[tracing::instrument(
        name = "watch",
        skip_all,
        fields(
            target = %self.operation.target_id(),
            kind = %self.operation.kind(),
            policy = self.policy.name(),
        )
    )]
    pub async fn run<S>(self, sink: &mut S) -> Result<()>
    where
        S: EventSink + ?Sized,
    {
        self.config.validate()?;

        let mut session = Session::new(self);
        let result = session.drive(sink).await;

        let (polls, delivered) = (session.polls, session.delivered);
        match &result {
            Ok(()) => info!(polls, delivered, "operation completed"),
            Err(WatchError::OperationFailed { reason }) => {
                info!(polls, delivered, %reason, "operation failed")
            }
            Err(err) if err.is_cancelled() => info!(polls, delivered, %err, "watch cancelled"),
            Err(err) => warn!(polls, delivered, %err, "watch aborted"),
        }
        result
    }

    /// 一次性"轮询直到结束"，事件只写入日志
    pub async fn wait(self) -> Result<()> {
        let mut sink = LogSink::default();
        self.run(&mut sink).await
    }

    /// 在后台任务中运行会话，以 `WatchStream` 交付事件。需在 tokio 运行时内调用。
    #[cfg(feature = "stream")]
    pub fn stream(self, buffer: StreamBuffer) -> WatchStream {
        self.stream_holding(buffer, ())
    }

    /// 同 [`Poller::stream`]，`held` 由后台任务持有，会话真正结束后、流关闭前释放。
    /// 流被丢弃只发出取消，不等待任务退出。
    #[cfg(feature = "stream")]
    pub fn stream_holding<T>(self, buffer: StreamBuffer, held: T) -> WatchStream
    where
        T: Send + 'static,
    {
        let token = self.cancel_token.clone();
        let (mut sink, events) = ChannelSink::channel(buffer);
        let task = tokio::spawn(async move {
            let result = self.run(&mut sink).await;
            drop(held);
            sink.finish(result).await;
        });
        WatchStream::new(events, token, task)
    }
}

/// 单个会话独占的运行时状态
struct Session {
    target_id: String,
    source: Arc<dyn EventSource>,
    policy: Box<dyn TerminalPolicy>,
    retry: RetryPolicy,
    interval: Duration,
    signal: CancelSignal,
    mark: HighWaterMark,
    latest: Option<WatchEvent>,
    polls: u64,
    delivered: u64,
}

impl Session {
    fn new(poller: Poller) -> Self {
        let Poller {
            operation,
            source,
            policy,
            config,
            cancel_token,
        } = poller;

        Self {
            target_id: operation.target_id().to_string(),
            source,
            policy,
            retry: config.retry,
            interval: config.poll_interval(),
            signal: CancelSignal::new(cancel_token, config.timeout()),
            mark: HighWaterMark::from_start(config.start),
            latest: None,
            polls: 0,
            delivered: 0,
        }
    }

    async fn drive<S>(&mut self, sink: &mut S) -> Result<()>
    where
        S: EventSink + ?Sized,
    {
        loop {
            self.signal.check()?;
            self.polls += 1;

            let mut batch = self.fetch().await?;
            let fetched = batch.len();
            // 稳定排序：同一时间戳保持事件源给出的顺序
            batch.sort_by_key(WatchEvent::timestamp);

            for event in batch {
                let stamp = event.stamp();
                if !self.mark.admits(&stamp) {
                    continue;
                }
                if event.concerns(&self.target_id) {
                    self.latest = Some(event.clone());
                }
                debug!(subject = event.subject_id(), status = event.status(), "deliver");
                self.signal.guard(sink.deliver(event)).await??;
                self.mark.advance_to(stamp);
                self.delivered += 1;
            }

            if fetched > 0 || self.policy.evaluates_when_idle() {
                match self.evaluate().await? {
                    Verdict::Pending => {}
                    Verdict::Succeeded => return Ok(()),
                    Verdict::Failed { reason } => {
                        return Err(WatchError::OperationFailed { reason });
                    }
                }
            }

            self.signal.sleep(self.interval).await?;
        }
    }

    async fn fetch(&mut self) -> Result<Vec<WatchEvent>> {
        let since = self.mark.timestamp();
        let mut failures = 0u32;
        loop {
            match self.signal.guard(self.source.fetch(since)).await? {
                Ok(batch) => return Ok(batch),
                Err(err) => backoff(&self.retry, &self.signal, err, &mut failures).await?,
            }
        }
    }

    async fn evaluate(&mut self) -> Result<Verdict> {
        let mut failures = 0u32;
        loop {
            let outcome = self
                .signal
                .guard(self.policy.evaluate(self.latest.as_ref()))
                .await?;
            match outcome {
                Ok(verdict) => return Ok(verdict),
                Err(err) => backoff(&self.retry, &self.signal, err, &mut failures).await?,
            }
        }
    }
}

/// 可重试错误在预算内等待后返回 `Ok`，否则原样返回错误
async fn backoff(
    retry: &RetryPolicy,
    signal: &CancelSignal,
    err: WatchError,
    failures: &mut u32,
) -> Result<()> {
    if !err.is_retryable() || *failures >= retry.max_retries {
        return Err(err);
    }
    *failures += 1;
    let delay = retry.delay_for(*failures);
    warn!(
        attempt = *failures,
        max_retries = retry.max_retries,
        delay_ms = delay.as_millis() as u64,
        error = %err,
        "event source call failed, retrying"
    );
    signal.sleep(delay).await?;
    Ok(())
}
