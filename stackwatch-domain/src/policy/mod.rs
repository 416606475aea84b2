//! 终态策略（TerminalPolicy）
//!
//! 每种控制面一个实现，根据会话内最近一条与目标匹配的事件判断操作是否已结束：
//! - `ProvisioningPolicy`：按栈状态码判定成功/失败；
//! - `DeploymentPolicy`：按部署计数与稳态消息判定成功，失败条件可配置。
//!
//! 轮询核心只依赖该接口，判定规则的替换不影响轮询循环本身。
//!
mod deployment;
mod provisioning;

pub use deployment::{
    DeploymentFailureMode, DeploymentPolicy, DeploymentProbe, DeploymentSnapshot, RolloutState,
    STEADY_STATE_SUFFIX, is_steady_state_message,
};
pub use provisioning::{ProvisioningPolicy, StackStatusClass};

use crate::{error::WatchResult as Result, event::WatchEvent};
use async_trait::async_trait;

/// 一次判定的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Pending,
    Succeeded,
    Failed { reason: String },
}

impl Verdict {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

#[async_trait]
pub trait TerminalPolicy: Send + Sync {
    /// 策略名称（用于日志）
    fn name(&self) -> &str;

    /// 批次为空时是否仍需判定（判定依据不全在事件流里的策略返回 true）
    fn evaluates_when_idle(&self) -> bool {
        false
    }

    /// `latest` 为会话内最近一条与目标匹配的事件，尚未出现时为 `None`
    async fn evaluate(&mut self, latest: Option<&WatchEvent>) -> Result<Verdict>;
}

#[async_trait]
impl<T> TerminalPolicy for Box<T>
where
    T: TerminalPolicy + ?Sized,
{
    fn name(&self) -> &str {
        (**self).name()
    }

    fn evaluates_when_idle(&self) -> bool {
        (**self).evaluates_when_idle()
    }

    async fn evaluate(&mut self, latest: Option<&WatchEvent>) -> Result<Verdict> {
        (**self).evaluate(latest).await
    }
}
