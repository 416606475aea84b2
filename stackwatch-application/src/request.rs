//! 监视请求（WatchRequest）
//!
//! 命令行解析/配置加载得到的输入：监视哪个目标、属于哪类操作、从何时开始。
//! 服务发布所需的部署 ID 与任务定义引用来自此前的"启动部署"调用。
//!
use crate::error::AppError;
use serde::{Deserialize, Serialize};
use stackwatch_domain::config::StartFrom;
use stackwatch_domain::operation::{Operation, OperationKind, ServiceRef};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WatchRequest {
    Stack {
        stack_name: String,
        kind: OperationKind,
        #[serde(default)]
        start: Option<StartFrom>,
    },
    Deployment {
        service: ServiceRef,
        deployment_id: String,
        /// 期望的任务定义（family:revision），仅用于日志
        #[serde(default)]
        task_definition: Option<String>,
        #[serde(default)]
        start: Option<StartFrom>,
    },
}

impl WatchRequest {
    pub fn stack(stack_name: impl Into<String>, kind: OperationKind) -> Self {
        Self::Stack {
            stack_name: stack_name.into(),
            kind,
            start: None,
        }
    }

    pub fn deployment(service: ServiceRef, deployment_id: impl Into<String>) -> Self {
        Self::Deployment {
            service,
            deployment_id: deployment_id.into(),
            task_definition: None,
            start: None,
        }
    }

    /// 覆盖服务配置中的起点
    pub fn starting_from(mut self, from: StartFrom) -> Self {
        match &mut self {
            Self::Stack { start, .. } | Self::Deployment { start, .. } => *start = Some(from),
        }
        self
    }

    pub fn start(&self) -> Option<StartFrom> {
        match self {
            Self::Stack { start, .. } | Self::Deployment { start, .. } => *start,
        }
    }

    pub fn target_id(&self) -> String {
        match self {
            Self::Stack { stack_name, .. } => stack_name.clone(),
            Self::Deployment { service, .. } => service.target_id(),
        }
    }

    pub fn operation(&self) -> Operation {
        match self {
            Self::Stack { stack_name, kind, .. } => Operation::new(stack_name.clone(), *kind),
            Self::Deployment { service, .. } => {
                Operation::new(service.target_id(), OperationKind::Deploy)
            }
        }
    }

    pub fn validate(&self) -> Result<(), AppError> {
        match self {
            Self::Stack { stack_name, kind, .. } => {
                if stack_name.trim().is_empty() {
                    return Err(AppError::Validation("stack name must not be empty".into()));
                }
                if *kind == OperationKind::Deploy {
                    return Err(AppError::Validation(
                        "stack operations are create, update or delete".into(),
                    ));
                }
            }
            Self::Deployment {
                service,
                deployment_id,
                ..
            } => {
                if service.cluster.trim().is_empty() || service.service.trim().is_empty() {
                    return Err(AppError::Validation(
                        "cluster and service must not be empty".into(),
                    ));
                }
                if deployment_id.trim().is_empty() {
                    return Err(AppError::Validation(
                        "deployment id must not be empty".into(),
                    ));
                }
            }
        }
        Ok(())
    }
}
