use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use futures_util::StreamExt;
use stackwatch_application::{AppError, EventLine, WatchRequest, WatchService, exit_code};
use stackwatch_domain::config::{Backoff, PollerConfig, RetryPolicy, StartFrom};
use stackwatch_domain::error::{WatchError, WatchResult};
use stackwatch_domain::event::WatchEvent;
use stackwatch_domain::operation::{OperationKind, ServiceRef};
use stackwatch_domain::policy::{DeploymentProbe, DeploymentSnapshot};
use stackwatch_domain::sink::StreamBuffer;
use stackwatch_domain::source::{EventPage, EventPager};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn t(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
}

fn ev(subject: &str, status: &str, secs: i64) -> WatchEvent {
    WatchEvent::builder()
        .subject_id(subject)
        .status(status)
        .timestamp(t(secs))
        .id(format!("{subject}-{secs}"))
        .build()
}

/// 内存事件日志：按目标保存时间正序的事件，分页时新到旧返回
struct LogPager {
    logs: Mutex<HashMap<String, Vec<WatchEvent>>>,
    page_size: usize,
    pages_served: AtomicUsize,
}

impl LogPager {
    fn new(page_size: usize) -> Arc<Self> {
        Arc::new(Self {
            logs: Mutex::new(HashMap::new()),
            page_size,
            pages_served: AtomicUsize::new(0),
        })
    }

    fn append(&self, target: &str, events: Vec<WatchEvent>) {
        self.logs
            .lock()
            .unwrap()
            .entry(target.to_string())
            .or_default()
            .extend(events);
    }
}

#[async_trait]
impl EventPager for LogPager {
    async fn fetch_page(&self, target_id: &str, token: Option<&str>) -> WatchResult<EventPage> {
        self.pages_served.fetch_add(1, Ordering::Relaxed);
        let offset: usize = match token {
            Some(token) => token
                .parse()
                .map_err(|_| WatchError::transport("bad page token"))?,
            None => 0,
        };
        let logs = self.logs.lock().unwrap();
        let newest_first: Vec<WatchEvent> = logs
            .get(target_id)
            .map(|events| events.iter().rev().cloned().collect())
            .unwrap_or_default();

        let end = (offset + self.page_size).min(newest_first.len());
        let page = newest_first[offset.min(end)..end].to_vec();
        let next_token = (end < newest_first.len()).then(|| end.to_string());
        Ok(EventPage::new(page, next_token))
    }
}

struct SteadyProbe;

#[async_trait]
impl DeploymentProbe for SteadyProbe {
    async fn describe(&self, _service: &ServiceRef) -> WatchResult<Vec<DeploymentSnapshot>> {
        Ok(vec![
            DeploymentSnapshot::builder()
                .id("ecs-svc/9")
                .desired_count(2)
                .running_count(2)
                .build(),
        ])
    }
}

fn fast_config() -> PollerConfig {
    PollerConfig {
        poll_interval_ms: 5,
        timeout_ms: None,
        retry: RetryPolicy {
            max_retries: 2,
            initial_backoff_ms: 1,
            max_backoff_ms: 2,
            backoff: Backoff::Exponential,
        },
        start: StartFrom::Beginning,
    }
}

fn service(stacks: Arc<LogPager>, services: Arc<LogPager>) -> Arc<WatchService> {
    Arc::new(
        WatchService::builder()
            .stack_events(stacks)
            .service_events(services)
            .deployments(Arc::new(SteadyProbe))
            .config(fast_config())
            .build(),
    )
}

#[tokio::test]
async fn stack_session_runs_to_completion_and_unregisters() -> anyhow::Result<()> {
    let stacks = LogPager::new(2);
    stacks.append(
        "web",
        vec![
            ev("web", "CREATE_IN_PROGRESS", 1),
            ev("Bucket", "CREATE_IN_PROGRESS", 2),
            ev("Bucket", "CREATE_COMPLETE", 3),
            ev("web", "CREATE_COMPLETE", 4),
        ],
    );
    let svc = service(stacks.clone(), LogPager::new(10));

    let session = svc.open(WatchRequest::stack("web", OperationKind::Create))?;
    assert_eq!(session.target_id(), "web");
    assert!(svc.is_watching("web"));

    let mut delivered = Vec::new();
    let result = session.run(&mut delivered).await;
    assert_eq!(exit_code(&result), 0);

    let lines: Vec<String> = delivered.iter().map(|e| EventLine(e).to_string()).collect();
    assert_eq!(lines.len(), 4);
    assert!(lines[0].ends_with("web  CREATE_IN_PROGRESS"));
    assert!(lines[3].ends_with("web  CREATE_COMPLETE"));
    // 全量历史两页
    assert_eq!(stacks.pages_served.load(Ordering::Relaxed), 2);
    assert!(!svc.is_watching("web"));
    Ok(())
}

#[tokio::test]
async fn failed_stack_maps_to_non_zero_exit_with_reason() -> anyhow::Result<()> {
    let stacks = LogPager::new(10);
    stacks.append(
        "web",
        vec![
            ev("web", "UPDATE_IN_PROGRESS", 1),
            WatchEvent::builder()
                .subject_id("web")
                .status("UPDATE_ROLLBACK_COMPLETE")
                .timestamp(t(2))
                .reason("Export web-url cannot be updated".to_string())
                .build(),
        ],
    );
    let svc = service(stacks, LogPager::new(10));

    let result = svc
        .open(WatchRequest::stack("web", OperationKind::Update))?
        .wait()
        .await;

    assert_eq!(exit_code(&result), 1);
    assert_eq!(
        result.unwrap_err().to_string(),
        "Export web-url cannot be updated"
    );
    Ok(())
}

#[tokio::test]
async fn second_session_on_same_target_is_rejected() -> anyhow::Result<()> {
    let svc = service(LogPager::new(10), LogPager::new(10));

    let first = svc.open(WatchRequest::stack("web", OperationKind::Delete))?;
    match svc.open(WatchRequest::stack("web", OperationKind::Delete)) {
        Err(AppError::AlreadyWatching { target }) => assert_eq!(target, "web"),
        Err(other) => panic!("unexpected {other:?}"),
        Ok(_) => panic!("duplicate session must be rejected"),
    }
    let other = svc.open(WatchRequest::stack("db", OperationKind::Delete))?;
    assert_eq!(svc.active_targets(), vec!["db".to_string(), "web".to_string()]);

    drop(first);
    drop(other);
    assert!(svc.active_targets().is_empty());
    svc.open(WatchRequest::stack("web", OperationKind::Delete))?;
    Ok(())
}

#[tokio::test]
async fn cancel_by_target_yields_cancelled_outcome() -> anyhow::Result<()> {
    let stacks = LogPager::new(10);
    stacks.append("web", vec![ev("web", "DELETE_IN_PROGRESS", 1)]);
    let svc = service(stacks, LogPager::new(10));

    let session = svc.open(WatchRequest::stack("web", OperationKind::Delete))?;
    let running = tokio::spawn(async move {
        let mut delivered = Vec::new();
        session.run(&mut delivered).await
    });

    svc.cancel("web")?;
    let result = running.await?;

    assert!(matches!(
        result,
        Err(AppError::Watch(WatchError::Cancelled { .. }))
    ));
    assert_eq!(exit_code(&result), 130);
    assert!(!svc.is_watching("web"));
    assert!(matches!(
        svc.cancel("web"),
        Err(AppError::NotWatching { .. })
    ));
    Ok(())
}

#[tokio::test]
async fn deployment_stream_finishes_on_steady_state() -> anyhow::Result<()> {
    let services = LogPager::new(10);
    services.append(
        "prod/web",
        vec![
            ev("prod/web", "(service web) has started 2 tasks: (task 1) (task 2).", 1),
            ev("prod/web", "(service web) has reached a steady state.", 2),
        ],
    );
    let svc = service(LogPager::new(10), services);

    let request = WatchRequest::deployment(ServiceRef::new("prod", "web"), "ecs-svc/9");
    let stream = svc.open(request)?.stream(StreamBuffer::Bounded(8));
    let items: Vec<_> = stream.collect().await;

    assert_eq!(items.len(), 2);
    assert!(items.iter().all(|i| i.is_ok()));
    assert!(!svc.is_watching("prod/web"));
    Ok(())
}

#[tokio::test]
async fn dropped_stream_keeps_target_registered_until_session_exits() -> anyhow::Result<()> {
    let stacks = LogPager::new(10);
    stacks.append("web", vec![ev("web", "CREATE_IN_PROGRESS", 1)]);
    let svc = service(stacks, LogPager::new(10));

    let mut stream = svc
        .open(WatchRequest::stack("web", OperationKind::Create))?
        .stream(StreamBuffer::Bounded(8));
    assert!(stream.next().await.transpose()?.is_some());
    drop(stream);

    // 取消已发出，后台会话还未退出，登记仍在
    assert!(svc.is_watching("web"));
    assert!(matches!(
        svc.open(WatchRequest::stack("web", OperationKind::Create)),
        Err(AppError::AlreadyWatching { .. })
    ));

    tokio::time::timeout(Duration::from_secs(2), async {
        while svc.is_watching("web") {
            tokio::task::yield_now().await;
        }
    })
    .await?;
    svc.open(WatchRequest::stack("web", OperationKind::Create))?;
    Ok(())
}

#[tokio::test]
async fn start_override_skips_earlier_history() -> anyhow::Result<()> {
    let stacks = LogPager::new(1);
    stacks.append(
        "web",
        vec![
            ev("web", "CREATE_IN_PROGRESS", -2),
            ev("Bucket", "CREATE_COMPLETE", -1),
            ev("web", "CREATE_COMPLETE", 1),
            ev("web", "UPDATE_IN_PROGRESS", 10),
            ev("web", "UPDATE_COMPLETE", 11),
        ],
    );
    let svc = service(stacks.clone(), LogPager::new(10));

    let request =
        WatchRequest::stack("web", OperationKind::Update).starting_from(StartFrom::At(t(5)));
    let mut delivered = Vec::new();
    svc.open(request)?.run(&mut delivered).await?;

    assert_eq!(delivered.len(), 2);
    // 读到 t=1 所在的第三页即停止，更早的两页不再请求
    assert_eq!(stacks.pages_served.load(Ordering::Relaxed), 3);
    Ok(())
}

#[tokio::test]
async fn independent_sessions_run_concurrently() -> anyhow::Result<()> {
    let stacks = LogPager::new(10);
    stacks.append("web", vec![ev("web", "CREATE_COMPLETE", 1)]);
    stacks.append("db", vec![ev("db", "DELETE_COMPLETE", 1)]);
    let svc = service(stacks, LogPager::new(10));

    let web = svc.open(WatchRequest::stack("web", OperationKind::Create))?;
    let db = svc.open(WatchRequest::stack("db", OperationKind::Delete))?;
    let (mut web_events, mut db_events) = (Vec::new(), Vec::new());

    let (a, b) = tokio::join!(web.run(&mut web_events), db.run(&mut db_events));
    a?;
    b?;

    assert_eq!(web_events[0].subject_id(), "web");
    assert_eq!(db_events[0].subject_id(), "db");
    assert!(svc.active_targets().is_empty());
    Ok(())
}
