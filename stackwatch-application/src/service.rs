//! 监视服务（WatchService）
//!
//! 把 `WatchRequest` 装配成一个轮询会话：
//! - 按操作类型选择事件源（栈事件 / 服务事件）与终态策略；
//! - 共享的控制面客户端（`EventPager`/`DeploymentProbe`）可被多个会话并发使用；
//! - 以目标为键登记运行中的会话，同一目标同时只允许一个会话，支持按目标取消。
//!
//! 会话之间不共享任何可变状态，登记表只保存取消令牌。
//!
use crate::{error::AppError, request::WatchRequest};
use bon::Builder;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use stackwatch_domain::Poller;
use stackwatch_domain::config::PollerConfig;
use stackwatch_domain::policy::{
    DeploymentFailureMode, DeploymentPolicy, DeploymentProbe, ProvisioningPolicy, TerminalPolicy,
};
use stackwatch_domain::sink::{EventSink, LogSink, StreamBuffer, WatchStream};
use stackwatch_domain::source::{EventPager, PagedEventSource};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio_util::sync::CancellationToken;

type Registry = Arc<DashMap<String, SessionEntry>>;

struct SessionEntry {
    id: u64,
    token: CancellationToken,
}

#[derive(Builder)]
pub struct WatchService {
    /// 基础设施编排控制面的栈事件分页接口
    stack_events: Arc<dyn EventPager>,
    /// 容器编排控制面的服务事件分页接口
    service_events: Arc<dyn EventPager>,
    /// 部署计数的旁路查询
    deployments: Arc<dyn DeploymentProbe>,
    #[builder(default)]
    config: PollerConfig,
    #[builder(default)]
    failure_mode: DeploymentFailureMode,
    #[builder(skip)]
    sessions: Registry,
    #[builder(skip)]
    next_id: AtomicU64,
}

impl WatchService {
    /// 为请求创建会话并登记目标；同一目标已有会话时返回 `AlreadyWatching`
    pub fn open(&self, request: WatchRequest) -> Result<WatchSession, AppError> {
        request.validate()?;
        let target = request.target_id();
        let token = CancellationToken::new();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        match self.sessions.entry(target.clone()) {
            Entry::Occupied(_) => return Err(AppError::AlreadyWatching { target }),
            Entry::Vacant(slot) => {
                slot.insert(SessionEntry {
                    id,
                    token: token.clone(),
                });
            }
        }
        let guard = SessionGuard {
            sessions: self.sessions.clone(),
            target: target.clone(),
            id,
        };

        let mut config = self.config.clone();
        if let Some(start) = request.start() {
            config.start = start;
        }

        let operation = request.operation();
        let (pager, policy): (Arc<dyn EventPager>, Box<dyn TerminalPolicy>) = match request {
            WatchRequest::Stack { .. } => (
                self.stack_events.clone(),
                Box::new(ProvisioningPolicy::new()) as Box<dyn TerminalPolicy>,
            ),
            WatchRequest::Deployment {
                service,
                deployment_id,
                task_definition,
                ..
            } => {
                tracing::info!(
                    target_id = %target,
                    deployment = %deployment_id,
                    task_definition = task_definition.as_deref().unwrap_or("-"),
                    "watching deployment"
                );
                let policy = DeploymentPolicy::builder()
                    .probe(self.deployments.clone())
                    .service(service)
                    .deployment_id(deployment_id)
                    .failure_mode(self.failure_mode)
                    .build();
                (
                    self.service_events.clone(),
                    Box::new(policy) as Box<dyn TerminalPolicy>,
                )
            }
        };

        let poller = Poller::builder()
            .operation(operation)
            .source(Arc::new(PagedEventSource::new(pager, target)))
            .policy(policy)
            .config(config)
            .cancel_token(token)
            .build();

        Ok(WatchSession { poller, guard })
    }

    /// 取消目标上运行中的会话
    pub fn cancel(&self, target: &str) -> Result<(), AppError> {
        match self.sessions.get(target) {
            Some(entry) => {
                entry.token.cancel();
                Ok(())
            }
            None => Err(AppError::NotWatching {
                target: target.to_string(),
            }),
        }
    }

    pub fn is_watching(&self, target: &str) -> bool {
        self.sessions.contains_key(target)
    }

    pub fn active_targets(&self) -> Vec<String> {
        let mut targets: Vec<String> = self.sessions.iter().map(|e| e.key().clone()).collect();
        targets.sort();
        targets
    }
}

/// 会话结束（被丢弃）时注销登记
struct SessionGuard {
    sessions: Registry,
    target: String,
    id: u64,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.sessions.remove_if(&self.target, |_, entry| entry.id == self.id);
    }
}

/// 已登记、尚未运行的会话
pub struct WatchSession {
    poller: Poller,
    guard: SessionGuard,
}

impl WatchSession {
    pub fn target_id(&self) -> &str {
        self.poller.operation().target_id()
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.poller.cancellation_token()
    }

    /// 以调用方提供的 sink 运行到终态
    pub async fn run<S>(self, sink: &mut S) -> Result<(), AppError>
    where
        S: EventSink + ?Sized,
    {
        let Self { poller, guard } = self;
        let result = poller.run(sink).await;
        drop(guard);
        result.map_err(AppError::from)
    }

    /// 运行到终态，事件只写入日志
    pub async fn wait(self) -> Result<(), AppError> {
        let mut sink = LogSink::default();
        self.run(&mut sink).await
    }

    /// 后台运行，以流的形式交付事件；流被丢弃时取消会话，
    /// 后台任务退出后才注销登记
    pub fn stream(self, buffer: StreamBuffer) -> WatchStream {
        let Self { poller, guard } = self;
        poller.stream_holding(buffer, guard)
    }
}
