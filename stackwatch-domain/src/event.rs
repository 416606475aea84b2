//! 控制面事件模型（WatchEvent）
//!
//! 描述控制面在事件日志中追加的一条不可变记录，并提供去重所需的
//! `EventKey` 与高水位比较所需的 `EventStamp`。
//!
use bon::Builder;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

#[derive(Debug, Clone, PartialEq, Eq, Builder, Serialize, Deserialize)]
#[builder(on(String, into))]
pub struct WatchEvent {
    /// 事件所属的资源/实体标识（栈的逻辑名、服务标识等）
    subject_id: String,
    /// 控制面状态码，或部署场景下的自由文本消息
    status: String,
    /// 控制面时钟下的发生时间，不保证严格递增或唯一
    timestamp: DateTime<Utc>,
    /// 失败类事件携带的原因，原样作为失败详情
    reason: Option<String>,
    /// 全局唯一事件 ID，部分控制面不提供
    id: Option<String>,
    /// 资源类型，仅用于展示
    resource_type: Option<String>,
}

impl WatchEvent {
    pub fn subject_id(&self) -> &str {
        &self.subject_id
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn resource_type(&self) -> Option<&str> {
        self.resource_type.as_deref()
    }

    pub fn concerns(&self, target_id: &str) -> bool {
        self.subject_id == target_id
    }

    pub fn key(&self) -> EventKey {
        match &self.id {
            Some(id) => EventKey::Id(id.clone()),
            None => {
                let mut hasher = DefaultHasher::new();
                self.subject_id.hash(&mut hasher);
                self.status.hash(&mut hasher);
                self.timestamp.hash(&mut hasher);
                EventKey::Composite(hasher.finish())
            }
        }
    }

    pub fn stamp(&self) -> EventStamp {
        EventStamp {
            timestamp: self.timestamp,
            key: self.key(),
        }
    }
}

/// 去重键：有事件 ID 时以其为准，否则退化为 subject+status+timestamp 的短哈希
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventKey {
    Id(String),
    Composite(u64),
}

/// 事件在高水位上的位置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventStamp {
    pub timestamp: DateTime<Utc>,
    pub key: EventKey,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn key_prefers_event_id() {
        let id = ulid::Ulid::new().to_string();
        let ev = WatchEvent::builder()
            .subject_id("web")
            .status("CREATE_IN_PROGRESS")
            .timestamp(at(10))
            .id(id.clone())
            .build();
        assert_eq!(ev.key(), EventKey::Id(id));
    }

    #[test]
    fn composite_key_distinguishes_status_at_same_instant() {
        let a = WatchEvent::builder()
            .subject_id("web")
            .status("CREATE_IN_PROGRESS")
            .timestamp(at(10))
            .build();
        let b = WatchEvent::builder()
            .subject_id("web")
            .status("CREATE_COMPLETE")
            .timestamp(at(10))
            .build();
        assert_ne!(a.key(), b.key());
        assert_eq!(a.key(), a.clone().key());
        assert!(a.concerns("web"));
        assert!(!a.concerns("web-db"));
    }
}
