//! 上传事件模块

mod bus;
mod types;

pub use bus::EventBus;
pub use types::{EventPriority, Notification, NotificationLevel, UploadEvent};
