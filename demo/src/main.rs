//! stackwatch 演示：在内存模拟的控制面上监视栈创建、失败回滚与服务发布。
//!
//! ```text
//! cargo run -p demo -- --scenario deploy
//! RUST_LOG=debug cargo run -p demo -- --scenario rollback --timeout-ms 5000
//! ```
mod simulated;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use simulated::{SimulatedDeployments, SimulatedLog, Step};
use stackwatch_application::{EventLine, WatchRequest, WatchService, exit_code};
use stackwatch_domain::config::{PollerConfig, StartFrom};
use stackwatch_domain::event::WatchEvent;
use stackwatch_domain::operation::{OperationKind, ServiceRef};
use stackwatch_domain::sink::CallbackSink;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Scenario {
    Create,
    Rollback,
    Deploy,
}

#[derive(Debug, Parser)]
#[command(name = "stackwatch-demo", about = "Watch simulated control-plane operations")]
struct Cli {
    #[arg(long, value_enum, default_value = "create")]
    scenario: Scenario,

    /// JSON 格式的 PollerConfig
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    interval_ms: Option<u64>,

    #[arg(long)]
    timeout_ms: Option<u64>,
}

impl Cli {
    fn poller_config(&self) -> Result<PollerConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("failed to read {}", path.display()))?;
                serde_json::from_str(&raw)
                    .with_context(|| format!("invalid poller config in {}", path.display()))?
            }
            None => PollerConfig {
                poll_interval_ms: 200,
                ..Default::default()
            },
        };
        if let Some(ms) = self.interval_ms {
            config.poll_interval_ms = ms;
        }
        if self.timeout_ms.is_some() {
            config.timeout_ms = self.timeout_ms;
        }
        Ok(config)
    }
}

fn stack_steps(scenario: Scenario) -> Vec<Step> {
    let mut steps = vec![
        Step::new(0, "web", "CREATE_IN_PROGRESS").resource("AWS::CloudFormation::Stack"),
        Step::new(300, "Cluster", "CREATE_IN_PROGRESS").resource("AWS::ECS::Cluster"),
        Step::new(700, "Cluster", "CREATE_COMPLETE").resource("AWS::ECS::Cluster"),
        Step::new(700, "Bucket", "CREATE_IN_PROGRESS").resource("AWS::S3::Bucket"),
    ];
    match scenario {
        Scenario::Rollback => steps.extend([
            Step::new(1_100, "Bucket", "CREATE_FAILED")
                .resource("AWS::S3::Bucket")
                .reason("web-assets already exists"),
            Step::new(1_200, "web", "ROLLBACK_IN_PROGRESS")
                .resource("AWS::CloudFormation::Stack")
                .reason("The following resource(s) failed to create: [Bucket]."),
            Step::new(1_800, "Cluster", "DELETE_COMPLETE").resource("AWS::ECS::Cluster"),
            Step::new(2_000, "web", "ROLLBACK_COMPLETE")
                .resource("AWS::CloudFormation::Stack")
                .reason("The following resource(s) failed to create: [Bucket]."),
        ]),
        _ => steps.extend([
            Step::new(1_100, "Bucket", "CREATE_COMPLETE").resource("AWS::S3::Bucket"),
            Step::new(1_500, "web", "CREATE_COMPLETE").resource("AWS::CloudFormation::Stack"),
        ]),
    }
    steps
}

fn service_steps(target: &str) -> Vec<Step> {
    vec![
        Step::new(0, target, "(service web) has started 3 tasks."),
        Step::new(400, target, "(service web) registered 3 targets in (target-group web-tg)"),
        Step::new(900, target, "(service web) has reached a steady state."),
    ]
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let config = cli.poller_config()?;

    let web = ServiceRef::new("prod", "web");
    let deployment_id = format!("ecs-svc/{}", ulid::Ulid::new());
    let service = Arc::new(
        WatchService::builder()
            .stack_events(Arc::new(SimulatedLog::new("web", stack_steps(cli.scenario))))
            .service_events(Arc::new(SimulatedLog::new(
                web.target_id(),
                service_steps(&web.target_id()),
            )))
            .deployments(Arc::new(SimulatedDeployments {
                deployment_id: deployment_id.clone(),
                desired: 3,
                task_start: Duration::from_millis(500),
                started: Instant::now(),
            }))
            .config(config)
            .build(),
    );

    let request = match cli.scenario {
        Scenario::Create | Scenario::Rollback => WatchRequest::stack("web", OperationKind::Create),
        Scenario::Deploy => WatchRequest::deployment(web, deployment_id),
    }
    .starting_from(StartFrom::Beginning);

    let session = service.open(request)?;
    let target = session.target_id().to_string();

    let ctrl_c = {
        let service = service.clone();
        let target = target.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                let _ = service.cancel(&target);
            }
        })
    };

    let mut sink = CallbackSink::new(|event: WatchEvent| println!("{}", EventLine(&event)));
    let result = session.run(&mut sink).await;
    ctrl_c.abort();

    match &result {
        Ok(()) => println!("{target}: done"),
        Err(err) => eprintln!("{target}: {err}"),
    }
    std::process::exit(exit_code(&result));
}
