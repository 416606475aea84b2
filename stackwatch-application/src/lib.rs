//! 应用层：把监视请求装配为轮询会话，并映射为面向命令行的输出与退出码。
pub mod error;
pub mod render;
pub mod request;
pub mod service;

pub use error::{AppError, exit_code};
pub use render::EventLine;
pub use request::WatchRequest;
pub use service::{WatchService, WatchSession};
