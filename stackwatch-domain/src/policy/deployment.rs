use super::{TerminalPolicy, Verdict};
use crate::{
    error::{WatchError, WatchResult as Result},
    event::WatchEvent,
    operation::ServiceRef,
};
use async_trait::async_trait;
use bon::Builder;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// 控制面在服务达到稳态时发出的消息后缀
pub const STEADY_STATE_SUFFIX: &str = "reached a steady state.";

/// 控制面没有结构化的稳态字段，只能匹配人类可读的消息
pub fn is_steady_state_message(message: &str) -> bool {
    message.ends_with(STEADY_STATE_SUFFIX)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RolloutState {
    InProgress,
    Completed,
    Failed,
}

/// 一次 describe 调用中单个部署的计数快照
#[derive(Debug, Clone, PartialEq, Eq, Builder, Serialize, Deserialize)]
#[builder(on(String, into))]
pub struct DeploymentSnapshot {
    pub id: String,
    pub desired_count: u32,
    pub running_count: u32,
    #[builder(default)]
    #[serde(default)]
    pub pending_count: u32,
    #[builder(default)]
    #[serde(default)]
    pub failed_tasks: u32,
    pub rollout_state: Option<RolloutState>,
    pub rollout_reason: Option<String>,
}

/// 部署计数的旁路查询（事件日志本身不携带计数）
#[async_trait]
pub trait DeploymentProbe: Send + Sync {
    async fn describe(&self, service: &ServiceRef) -> Result<Vec<DeploymentSnapshot>>;
}

#[async_trait]
impl<T> DeploymentProbe for Arc<T>
where
    T: DeploymentProbe + ?Sized,
{
    async fn describe(&self, service: &ServiceRef) -> Result<Vec<DeploymentSnapshot>> {
        (**self).describe(service).await
    }
}

/// 部署失败的判定方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum DeploymentFailureMode {
    /// 不主动判定失败，只依赖会话截止时间
    #[default]
    TimeoutOnly,
    /// 失败任务数达到阈值即判定失败
    FailedTasks { threshold: u32 },
    /// 控制面报告 rollout 状态为 FAILED 即判定失败
    RolloutState,
}

/// 服务发布的终态策略
#[derive(Builder)]
pub struct DeploymentPolicy {
    probe: Arc<dyn DeploymentProbe>,
    service: ServiceRef,
    #[builder(into)]
    deployment_id: String,
    #[builder(default)]
    failure_mode: DeploymentFailureMode,
    #[builder(skip)]
    last_counts: Option<(u32, u32)>,
}

impl DeploymentPolicy {
    pub fn deployment_id(&self) -> &str {
        &self.deployment_id
    }

    fn failure_of(&self, deployment: &DeploymentSnapshot) -> Option<String> {
        match self.failure_mode {
            DeploymentFailureMode::TimeoutOnly => None,
            DeploymentFailureMode::FailedTasks { threshold } => {
                (deployment.failed_tasks >= threshold.max(1)).then(|| {
                    format!(
                        "deployment {} has {} failed tasks",
                        deployment.id, deployment.failed_tasks
                    )
                })
            }
            DeploymentFailureMode::RolloutState => {
                (deployment.rollout_state == Some(RolloutState::Failed)).then(|| {
                    deployment
                        .rollout_reason
                        .clone()
                        .unwrap_or_else(|| format!("deployment {} rollout failed", deployment.id))
                })
            }
        }
    }
}

#[async_trait]
impl TerminalPolicy for DeploymentPolicy {
    fn name(&self) -> &str {
        "deployment"
    }

    fn evaluates_when_idle(&self) -> bool {
        true
    }

    async fn evaluate(&mut self, latest: Option<&WatchEvent>) -> Result<Verdict> {
        let snapshots = self.probe.describe(&self.service).await?;
        let mut matching: Vec<DeploymentSnapshot> = snapshots
            .into_iter()
            .filter(|d| d.id == self.deployment_id)
            .collect();

        if matching.len() != 1 {
            return Err(WatchError::PolicyAmbiguity {
                deployment_id: self.deployment_id.clone(),
                matches: matching.len(),
            });
        }
        let deployment = matching.remove(0);

        let counts = (deployment.desired_count, deployment.running_count);
        if self.last_counts != Some(counts) {
            tracing::debug!(
                deployment = %deployment.id,
                desired = counts.0,
                running = counts.1,
                pending = deployment.pending_count,
                "deployment counts changed"
            );
            self.last_counts = Some(counts);
        }

        if let Some(reason) = self.failure_of(&deployment) {
            return Ok(Verdict::Failed { reason });
        }

        let steady = latest.is_some_and(|e| is_steady_state_message(e.status()));
        if steady && deployment.desired_count == deployment.running_count {
            Ok(Verdict::Succeeded)
        } else {
            Ok(Verdict::Pending)
        }
    }
}
