//! 被监视的异步操作（Operation）
//!
//! 一次监视会话只针对一个操作：由 `target_id` 标识，由 `kind` 选择终态策略。
//! 操作只在会话期间存在，不做持久化。
//!
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Create,
    Update,
    Delete,
    Deploy,
}

/// 终态策略族
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyFamily {
    Provisioning,
    Deployment,
}

impl OperationKind {
    pub fn policy_family(&self) -> PolicyFamily {
        match self {
            Self::Create | Self::Update | Self::Delete => PolicyFamily::Provisioning,
            Self::Deploy => PolicyFamily::Deployment,
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create => write!(f, "create"),
            Self::Update => write!(f, "update"),
            Self::Delete => write!(f, "delete"),
            Self::Deploy => write!(f, "deploy"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Operation {
    target_id: String,
    kind: OperationKind,
}

impl Operation {
    pub fn new(target_id: impl Into<String>, kind: OperationKind) -> Self {
        Self {
            target_id: target_id.into(),
            kind,
        }
    }

    pub fn target_id(&self) -> &str {
        &self.target_id
    }

    pub fn kind(&self) -> OperationKind {
        self.kind
    }
}

/// 容器编排控制面中的服务定位（集群 + 服务名）
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServiceRef {
    pub cluster: String,
    pub service: String,
}

impl ServiceRef {
    pub fn new(cluster: impl Into<String>, service: impl Into<String>) -> Self {
        Self {
            cluster: cluster.into(),
            service: service.into(),
        }
    }

    /// 服务事件的 subject 形如 `cluster/service`
    pub fn target_id(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ServiceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.cluster, self.service)
    }
}
