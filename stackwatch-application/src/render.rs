use chrono::SecondsFormat;
use stackwatch_domain::event::WatchEvent;
use std::fmt;

/// 面向终端的单行事件：时间、主体、状态、资源类型、原因
pub struct EventLine<'a>(pub &'a WatchEvent);

impl fmt::Display for EventLine<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let event = self.0;
        write!(
            f,
            "{}  {}  {}",
            event.timestamp().to_rfc3339_opts(SecondsFormat::Secs, true),
            event.subject_id(),
            event.status()
        )?;
        if let Some(resource_type) = event.resource_type() {
            write!(f, "  {resource_type}")?;
        }
        if let Some(reason) = event.reason() {
            write!(f, "  {reason}")?;
        }
        Ok(())
    }
}
