//! 控制面事件对账轮询（stackwatch-domain）
//!
//! 基础设施编排与容器编排这两类控制面都只以分页、只追加的事件日志暴露进度，
//! 没有"等待完成"的调用。本 crate 提供统一的轮询引擎：
//! - 事件源（`source`）：包装"列出某时刻之后的事件"的分页接口；
//! - 高水位（`mark`）：保证同一会话内事件不重复投递；
//! - 终态策略（`policy`）：栈供应与服务发布两种判定规则；
//! - 投递（`sink`）：同步回调、日志或异步事件流；
//! - 轮询核心（`poller`）：把以上组件串成一个可取消、可重试的循环。
//!
//! 典型用法：
//! 1. 为控制面实现 `EventPager`（以及发布场景的 `DeploymentProbe`）；
//! 2. 用 `PagedEventSource` 与对应的 `TerminalPolicy` 构建 `Poller`；
//! 3. 选择 `run`（自带 sink）、`wait`（只写日志）或 `stream`（异步消费）驱动会话。
//!
pub mod cancel;
pub mod config;
pub mod error;
pub mod event;
pub mod mark;
pub mod operation;
pub mod poller;
pub mod policy;
pub mod sink;
pub mod source;

pub use poller::Poller;
