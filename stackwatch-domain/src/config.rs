//! 轮询配置
//!
//! 所有时长以毫秒存储，便于在 JSON/TOML 等配置文件中书写，
//! 通过访问器转换为 `Duration`。
//!
use crate::error::{WatchError, WatchResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_POLL_INTERVAL_MS: u64 = 1_000;
const DEFAULT_MAX_RETRIES: u32 = 5;
const DEFAULT_INITIAL_BACKOFF_MS: u64 = 500;
const DEFAULT_MAX_BACKOFF_MS: u64 = 8_000;

/// 轮询会话配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollerConfig {
    /// 两轮查询之间的固定间隔
    pub poll_interval_ms: u64,
    /// 会话截止时间（从 run 开始计时），到期视为取消
    pub timeout_ms: Option<u64>,
    /// 事件源瞬时故障的重试策略
    pub retry: RetryPolicy,
    /// 高水位的初始位置
    pub start: StartFrom,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            timeout_ms: None,
            retry: RetryPolicy::default(),
            start: StartFrom::default(),
        }
    }
}

impl PollerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    pub fn validate(&self) -> WatchResult<()> {
        if self.poll_interval_ms == 0 {
            return Err(WatchError::InvalidConfig {
                reason: "poll_interval_ms must be greater than zero".into(),
            });
        }
        if self.retry.initial_backoff_ms == 0 {
            return Err(WatchError::InvalidConfig {
                reason: "retry.initial_backoff_ms must be greater than zero".into(),
            });
        }
        if self.retry.max_backoff_ms < self.retry.initial_backoff_ms {
            return Err(WatchError::InvalidConfig {
                reason: "retry.max_backoff_ms must not be below retry.initial_backoff_ms".into(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backoff {
    Fixed,
    #[default]
    Exponential,
}

/// 连续失败的重试上限与退避（独立于稳态轮询间隔）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            initial_backoff_ms: DEFAULT_INITIAL_BACKOFF_MS,
            max_backoff_ms: DEFAULT_MAX_BACKOFF_MS,
            backoff: Backoff::default(),
        }
    }
}

impl RetryPolicy {
    /// 第 `attempt` 次重试（从 1 开始）前的等待时长
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let ms = match self.backoff {
            Backoff::Fixed => self.initial_backoff_ms,
            Backoff::Exponential => {
                let factor = 1u64
                    .checked_shl(attempt.saturating_sub(1))
                    .unwrap_or(u64::MAX);
                self.initial_backoff_ms.saturating_mul(factor)
            }
        };
        Duration::from_millis(ms.min(self.max_backoff_ms))
    }
}

/// 高水位的起点
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StartFrom {
    /// 零时刻：首轮会把目标的全部历史当作新事件投递
    #[default]
    Beginning,
    /// 会话启动时刻：只关心之后的事件
    Now,
    /// 指定时刻（通常是发起操作请求的时间）
    At(DateTime<Utc>),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exponential_backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            max_retries: 10,
            initial_backoff_ms: 100,
            max_backoff_ms: 1_000,
            backoff: Backoff::Exponential,
        };
        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for(4), Duration::from_millis(800));
        assert_eq!(policy.delay_for(5), Duration::from_millis(1_000));
        assert_eq!(policy.delay_for(200), Duration::from_millis(1_000));
    }

    #[test]
    fn fixed_backoff_is_constant() {
        let policy = RetryPolicy {
            backoff: Backoff::Fixed,
            ..Default::default()
        };
        assert_eq!(policy.delay_for(1), policy.delay_for(7));
    }

    #[test]
    fn config_deserializes_with_defaults() {
        let cfg: PollerConfig = serde_json::from_str(
            r#"{ "poll_interval_ms": 250, "retry": { "max_retries": 2, "backoff": "fixed" }, "start": "now" }"#,
        )
        .unwrap();
        assert_eq!(cfg.poll_interval(), Duration::from_millis(250));
        assert_eq!(cfg.timeout(), None);
        assert_eq!(cfg.retry.max_retries, 2);
        assert_eq!(cfg.retry.backoff, Backoff::Fixed);
        assert_eq!(cfg.retry.initial_backoff_ms, DEFAULT_INITIAL_BACKOFF_MS);
        assert_eq!(cfg.start, StartFrom::Now);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn zero_interval_is_rejected() {
        let cfg = PollerConfig {
            poll_interval_ms: 0,
            ..Default::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(WatchError::InvalidConfig { .. })
        ));
    }
}
