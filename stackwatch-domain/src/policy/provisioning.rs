use super::{TerminalPolicy, Verdict};
use crate::{error::WatchResult as Result, event::WatchEvent};
use async_trait::async_trait;

const COMPLETE_CODES: &[&str] = &["CREATE_COMPLETE", "UPDATE_COMPLETE", "DELETE_COMPLETE"];

const FAILED_CODES: &[&str] = &[
    "CREATE_FAILED",
    "UPDATE_FAILED",
    "DELETE_FAILED",
    "ROLLBACK_COMPLETE",
    "ROLLBACK_FAILED",
    "UPDATE_ROLLBACK_COMPLETE",
    "UPDATE_ROLLBACK_FAILED",
];

/// 栈状态码的分类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackStatusClass {
    InProgress,
    Complete,
    Failed,
}

impl StackStatusClass {
    /// 不在终态表中的状态码（包括 `*_IN_PROGRESS`）一律视为进行中
    pub fn classify(status: &str) -> Self {
        if COMPLETE_CODES.contains(&status) {
            Self::Complete
        } else if FAILED_CODES.contains(&status) {
            Self::Failed
        } else {
            Self::InProgress
        }
    }
}

/// 栈创建/更新/删除的终态策略
#[derive(Debug, Clone, Copy, Default)]
pub struct ProvisioningPolicy;

impl ProvisioningPolicy {
    pub fn new() -> Self {
        Self
    }

    pub fn verdict_for(event: &WatchEvent) -> Verdict {
        match StackStatusClass::classify(event.status()) {
            StackStatusClass::InProgress => Verdict::Pending,
            StackStatusClass::Complete => Verdict::Succeeded,
            StackStatusClass::Failed => Verdict::Failed {
                reason: event.reason().unwrap_or_default().to_string(),
            },
        }
    }
}

#[async_trait]
impl TerminalPolicy for ProvisioningPolicy {
    fn name(&self) -> &str {
        "provisioning"
    }

    async fn evaluate(&mut self, latest: Option<&WatchEvent>) -> Result<Verdict> {
        Ok(latest.map(Self::verdict_for).unwrap_or(Verdict::Pending))
    }
}
