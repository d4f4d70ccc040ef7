//! 事件分发
//!
//! 每个订阅者持有一个无界通道，按发布顺序收到全部事件

use super::types::{EventPriority, UploadEvent};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, trace};

/// 上传事件总线
#[derive(Debug, Default)]
pub struct EventBus {
    subscribers: Mutex<Vec<mpsc::UnboundedSender<UploadEvent>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// 订阅事件
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<UploadEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.lock().push(tx);
        rx
    }

    /// 发布事件，顺带清理已关闭的订阅者
    pub fn publish(&self, event: UploadEvent) {
        // 进度类事件数量多，只在 trace 级别输出
        if event.priority() == EventPriority::Low {
            trace!(
                "发布事件: type={}, task={:?}",
                event.event_type_name(),
                event.task_id()
            );
        } else {
            debug!(
                "发布事件: type={}, task={:?}",
                event.event_type_name(),
                event.task_id()
            );
        }

        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }
}
