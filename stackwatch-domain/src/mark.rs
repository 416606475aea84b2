//! 高水位（HighWaterMark）
//!
//! 记录会话内已投递事件的最大时间戳，以及该时间戳上已投递事件的键集合：
//! - 时间戳严格大于水位的事件视为新事件；
//! - 时间戳等于水位的事件，仅当其键不在边界集合中时视为新事件；
//! - 早于水位的事件一律拒绝。
//!
//! 水位只前进不回退。比水位更早的事件已被时间戳拒绝，所以只需保留边界上的键。
//!
use crate::config::StartFrom;
use crate::event::{EventKey, EventStamp, WatchEvent};
use chrono::{DateTime, Utc};
use std::collections::HashSet;

#[derive(Debug, Clone)]
pub struct HighWaterMark {
    timestamp: DateTime<Utc>,
    boundary: HashSet<EventKey>,
}

impl Default for HighWaterMark {
    fn default() -> Self {
        Self::origin()
    }
}

impl HighWaterMark {
    /// 零时刻：首轮投递全部历史
    pub fn origin() -> Self {
        Self::starting_at(DateTime::<Utc>::MIN_UTC)
    }

    /// 以给定时刻为起点，早于该时刻的事件不会被投递
    pub fn starting_at(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            boundary: HashSet::new(),
        }
    }

    pub fn from_start(start: StartFrom) -> Self {
        match start {
            StartFrom::Beginning => Self::origin(),
            StartFrom::Now => Self::starting_at(Utc::now()),
            StartFrom::At(at) => Self::starting_at(at),
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn admit(&self, event: &WatchEvent) -> bool {
        self.admits(&event.stamp())
    }

    pub fn admits(&self, stamp: &EventStamp) -> bool {
        if stamp.timestamp > self.timestamp {
            return true;
        }
        stamp.timestamp == self.timestamp && !self.boundary.contains(&stamp.key)
    }

    pub fn advance(&mut self, event: &WatchEvent) {
        self.advance_to(event.stamp());
    }

    pub fn advance_to(&mut self, stamp: EventStamp) {
        if stamp.timestamp > self.timestamp {
            self.timestamp = stamp.timestamp;
            self.boundary.clear();
            self.boundary.insert(stamp.key);
        } else if stamp.timestamp == self.timestamp {
            self.boundary.insert(stamp.key);
        }
    }
}
