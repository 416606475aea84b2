//! 内存模拟的控制面：按脚本随时间追加事件，部署计数随时间收敛。
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use stackwatch_domain::error::WatchResult;
use stackwatch_domain::event::WatchEvent;
use stackwatch_domain::operation::ServiceRef;
use stackwatch_domain::policy::{DeploymentProbe, DeploymentSnapshot, RolloutState};
use stackwatch_domain::source::{EventPage, EventPager};
use std::time::{Duration, Instant};

const PAGE_SIZE: usize = 3;

pub struct Step {
    pub after: Duration,
    pub subject: String,
    pub status: String,
    pub resource_type: Option<String>,
    pub reason: Option<String>,
}

impl Step {
    pub fn new(after_ms: u64, subject: &str, status: &str) -> Self {
        Self {
            after: Duration::from_millis(after_ms),
            subject: subject.to_string(),
            status: status.to_string(),
            resource_type: None,
            reason: None,
        }
    }

    pub fn resource(mut self, resource_type: &str) -> Self {
        self.resource_type = Some(resource_type.to_string());
        self
    }

    pub fn reason(mut self, reason: &str) -> Self {
        self.reason = Some(reason.to_string());
        self
    }
}

/// 一个目标的事件日志，只暴露已经"发生"的事件
pub struct SimulatedLog {
    target_id: String,
    started: Instant,
    origin: DateTime<Utc>,
    steps: Vec<Step>,
}

impl SimulatedLog {
    pub fn new(target_id: impl Into<String>, steps: Vec<Step>) -> Self {
        Self {
            target_id: target_id.into(),
            started: Instant::now(),
            origin: Utc::now(),
            steps,
        }
    }

    fn visible(&self) -> Vec<WatchEvent> {
        let elapsed = self.started.elapsed();
        let mut events: Vec<WatchEvent> = self
            .steps
            .iter()
            .enumerate()
            .filter(|(_, s)| s.after <= elapsed)
            .map(|(index, s)| {
                WatchEvent::builder()
                    .subject_id(s.subject.clone())
                    .status(s.status.clone())
                    .timestamp(self.origin + s.after)
                    // 同一时刻的多条事件以脚本序号区分
                    .id(
                        ulid::Ulid::from_parts(s.after.as_millis() as u64, index as u128)
                            .to_string(),
                    )
                    .maybe_resource_type(s.resource_type.clone())
                    .maybe_reason(s.reason.clone())
                    .build()
            })
            .collect();
        events.reverse();
        events
    }
}

#[async_trait]
impl EventPager for SimulatedLog {
    async fn fetch_page(&self, target_id: &str, token: Option<&str>) -> WatchResult<EventPage> {
        if target_id != self.target_id {
            return Ok(EventPage::default());
        }
        let offset = token.and_then(|t| t.parse::<usize>().ok()).unwrap_or(0);
        let newest_first = self.visible();
        let end = (offset + PAGE_SIZE).min(newest_first.len());
        let page = newest_first[offset.min(end)..end].to_vec();
        let next_token = (end < newest_first.len()).then(|| end.to_string());
        Ok(EventPage::new(page, next_token))
    }
}

/// 每隔 `task_start` 多启动一个任务，直到达到期望数量
pub struct SimulatedDeployments {
    pub deployment_id: String,
    pub desired: u32,
    pub task_start: Duration,
    pub started: Instant,
}

#[async_trait]
impl DeploymentProbe for SimulatedDeployments {
    async fn describe(&self, _service: &ServiceRef) -> WatchResult<Vec<DeploymentSnapshot>> {
        let ticks = self.started.elapsed().as_millis() / self.task_start.as_millis().max(1);
        let running = (ticks as u32).min(self.desired);
        let state = if running == self.desired {
            RolloutState::Completed
        } else {
            RolloutState::InProgress
        };
        Ok(vec![
            DeploymentSnapshot::builder()
                .id(self.deployment_id.clone())
                .desired_count(self.desired)
                .running_count(running)
                .pending_count(self.desired - running)
                .rollout_state(state)
                .build(),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stackwatch_domain::Poller;
    use stackwatch_domain::config::{PollerConfig, StartFrom};
    use stackwatch_domain::operation::{Operation, OperationKind};
    use stackwatch_domain::policy::ProvisioningPolicy;
    use stackwatch_domain::source::PagedEventSource;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn steps_at_the_same_instant_get_distinct_ids() {
        let log = SimulatedLog::new(
            "web",
            vec![
                Step::new(0, "Cluster", "CREATE_COMPLETE"),
                Step::new(0, "Bucket", "CREATE_IN_PROGRESS"),
            ],
        );
        let events = log.visible();
        let ids: HashSet<_> = events.iter().filter_map(|e| e.id()).collect();
        assert_eq!(events.len(), 2);
        assert_eq!(ids.len(), 2);
    }

    #[tokio::test]
    async fn every_same_instant_step_reaches_the_sink() {
        let log = Arc::new(SimulatedLog::new(
            "web",
            vec![
                Step::new(0, "web", "CREATE_IN_PROGRESS"),
                Step::new(0, "Cluster", "CREATE_COMPLETE"),
                Step::new(0, "Bucket", "CREATE_IN_PROGRESS"),
                Step::new(0, "Bucket", "CREATE_COMPLETE"),
                Step::new(0, "web", "CREATE_COMPLETE"),
            ],
        ));
        let config = PollerConfig {
            poll_interval_ms: 5,
            timeout_ms: Some(2_000),
            start: StartFrom::Beginning,
            ..Default::default()
        };

        let mut delivered: Vec<WatchEvent> = Vec::new();
        Poller::builder()
            .operation(Operation::new("web", OperationKind::Create))
            .source(Arc::new(PagedEventSource::new(log, "web")))
            .policy(Box::new(ProvisioningPolicy::new()))
            .config(config)
            .build()
            .run(&mut delivered)
            .await
            .unwrap();

        let subjects: Vec<_> = delivered
            .iter()
            .map(|e| format!("{} {}", e.subject_id(), e.status()))
            .collect();
        assert_eq!(
            subjects,
            [
                "web CREATE_IN_PROGRESS",
                "Cluster CREATE_COMPLETE",
                "Bucket CREATE_IN_PROGRESS",
                "Bucket CREATE_COMPLETE",
                "web CREATE_COMPLETE",
            ]
        );
    }
}
