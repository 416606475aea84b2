use super::{EventPage, EventPager, EventSource};
use crate::{
    error::{WatchError, WatchResult as Result},
    event::WatchEvent,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_core::stream::BoxStream;
use futures_util::{TryStreamExt, stream};
use std::sync::Arc;

/// 惰性翻页的事件源：一旦某页最旧事件不晚于 `since` 就停止请求后续页，
/// 稳态轮询的开销因此只与新事件数量相关。
#[derive(Clone)]
pub struct PagedEventSource {
    pager: Arc<dyn EventPager>,
    target_id: String,
}

enum Cursor {
    Start,
    Next(String),
    Done,
}

impl PagedEventSource {
    pub fn new(pager: Arc<dyn EventPager>, target_id: impl Into<String>) -> Self {
        Self {
            pager,
            target_id: target_id.into(),
        }
    }

    pub fn target_id(&self) -> &str {
        &self.target_id
    }

    fn pages(&self) -> BoxStream<'_, Result<EventPage>> {
        Box::pin(stream::try_unfold(Cursor::Start, move |cursor| async move {
            let token = match cursor {
                Cursor::Start => None,
                Cursor::Next(token) => Some(token),
                Cursor::Done => return Ok(None),
            };

            let page = self
                .pager
                .fetch_page(&self.target_id, token.as_deref())
                .await?;

            let next = match &page.next_token {
                Some(token) => Cursor::Next(token.clone()),
                None => Cursor::Done,
            };
            Ok::<_, WatchError>(Some((page, next)))
        }))
    }
}

#[async_trait]
impl EventSource for PagedEventSource {
    async fn fetch(&self, since: DateTime<Utc>) -> Result<Vec<WatchEvent>> {
        let mut pages = self.pages();
        let mut batch = Vec::new();
        let mut requested = 0usize;

        while let Some(page) = pages.try_next().await? {
            requested += 1;
            let reached_mark = page.oldest().is_some_and(|oldest| oldest <= since);
            // 与水位相等的事件保留下来，交给高水位按键去重
            batch.extend(page.events.into_iter().filter(|e| e.timestamp() >= since));
            if reached_mark {
                break;
            }
        }

        // 分页是新到旧，反转后同一时刻的事件保持日志中的先后
        batch.reverse();
        tracing::trace!(target_id = %self.target_id, pages = requested, events = batch.len(), "fetched event pages");
        Ok(batch)
    }
}
