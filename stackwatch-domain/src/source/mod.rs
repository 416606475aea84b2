//! 事件源（EventSource）协议
//!
//! 把某个控制面的"列出某时刻之后的事件"调用包装成统一接口：
//! - `EventSource`：轮询核心使用的单次抓取接口，返回的批次不保证顺序；
//! - `EventPager`：控制面原生的分页接口，页内与页间均为新到旧；
//! - `PagedEventSource`：在 `EventPager` 之上惰性翻页的默认适配器。
//!
//! 排序与去重是轮询核心的职责，事件源只负责尽量少地取回数据。
//!
mod paged;

pub use paged::PagedEventSource;

use crate::{error::WatchResult as Result, event::WatchEvent};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// 事件源：取回时间戳不早于 `since` 的事件
#[async_trait]
pub trait EventSource: Send + Sync {
    /// `since` 为零时刻时返回全部历史；传输/鉴权/限流故障以 `WatchError::Source` 返回
    async fn fetch(&self, since: DateTime<Utc>) -> Result<Vec<WatchEvent>>;
}

#[async_trait]
impl<T> EventSource for Arc<T>
where
    T: EventSource + ?Sized,
{
    async fn fetch(&self, since: DateTime<Utc>) -> Result<Vec<WatchEvent>> {
        (**self).fetch(since).await
    }
}

/// 控制面返回的一页事件（新到旧）
#[derive(Debug, Clone, Default)]
pub struct EventPage {
    pub events: Vec<WatchEvent>,
    /// 续页令牌，`None` 表示没有更多页
    pub next_token: Option<String>,
}

impl EventPage {
    pub fn new(events: Vec<WatchEvent>, next_token: Option<String>) -> Self {
        Self { events, next_token }
    }

    /// 本页最旧事件的时间戳
    pub fn oldest(&self) -> Option<DateTime<Utc>> {
        self.events.iter().map(WatchEvent::timestamp).min()
    }
}

/// 控制面的分页事件查询接口，实现需可被多个会话并发共享
#[async_trait]
pub trait EventPager: Send + Sync {
    async fn fetch_page(&self, target_id: &str, page_token: Option<&str>) -> Result<EventPage>;
}

#[async_trait]
impl<T> EventPager for Arc<T>
where
    T: EventPager + ?Sized,
{
    async fn fetch_page(&self, target_id: &str, page_token: Option<&str>) -> Result<EventPage> {
        (**self).fetch_page(target_id, page_token).await
    }
}
