//! 上传事件类型定义
//!
//! 所有任务状态变化都以事件形式推送给订阅者

use crate::api::UploadedFile;
use serde::{Deserialize, Serialize};

/// 事件优先级
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum EventPriority {
    /// 低优先级：进度更新
    Low = 0,
    /// 中优先级：状态变更
    Medium = 1,
    /// 高优先级：完成、失败、拒绝等关键事件
    High = 2,
}

/// 上传事件
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum UploadEvent {
    /// 文件未通过准入校验
    Rejected {
        file_name: String,
        mime_type: String,
        size: u64,
        reason: String,
    },
    /// 任务进入等待队列
    Queued {
        task_id: String,
        batch_id: String,
        file_name: String,
        size: u64,
        total_chunks: usize,
    },
    /// 任务获得上传名额
    Started {
        task_id: String,
        batch_id: String,
        file_name: String,
    },
    /// 分片上传完成
    Processing {
        task_id: String,
        batch_id: String,
        chunk_index: usize,
        total_chunks: usize,
        progress: u8,
    },
    /// 全部分片完成，等待合并
    Finalizing { task_id: String, batch_id: String },
    /// 上传完成
    Completed {
        task_id: String,
        batch_id: String,
        file_name: String,
        file: UploadedFile,
    },
    /// 上传失败
    Failed {
        task_id: String,
        batch_id: String,
        file_name: String,
        stage: String,
        error: String,
    },
    /// 本地记录写入失败（上传本身已完成）
    StorageFailed {
        task_id: String,
        file_name: String,
        error: String,
    },
    /// 批次总体进度
    BatchProgress {
        batch_id: String,
        overall_progress: u8,
        completed_chunks: usize,
        expected_chunks: usize,
        finished_files: usize,
        total_files: usize,
    },
}

impl UploadEvent {
    /// 获取任务ID（拒绝事件与批次事件没有任务）
    pub fn task_id(&self) -> Option<&str> {
        match self {
            UploadEvent::Queued { task_id, .. }
            | UploadEvent::Started { task_id, .. }
            | UploadEvent::Processing { task_id, .. }
            | UploadEvent::Finalizing { task_id, .. }
            | UploadEvent::Completed { task_id, .. }
            | UploadEvent::Failed { task_id, .. }
            | UploadEvent::StorageFailed { task_id, .. } => Some(task_id),
            UploadEvent::Rejected { .. } | UploadEvent::BatchProgress { .. } => None,
        }
    }

    /// 获取事件优先级
    pub fn priority(&self) -> EventPriority {
        match self {
            UploadEvent::Processing { .. } | UploadEvent::BatchProgress { .. } => {
                EventPriority::Low
            }
            UploadEvent::Queued { .. }
            | UploadEvent::Started { .. }
            | UploadEvent::Finalizing { .. } => EventPriority::Medium,
            UploadEvent::Rejected { .. }
            | UploadEvent::Completed { .. }
            | UploadEvent::Failed { .. }
            | UploadEvent::StorageFailed { .. } => EventPriority::High,
        }
    }

    /// 获取事件类型名称
    pub fn event_type_name(&self) -> &'static str {
        match self {
            UploadEvent::Rejected { .. } => "rejected",
            UploadEvent::Queued { .. } => "queued",
            UploadEvent::Started { .. } => "started",
            UploadEvent::Processing { .. } => "processing",
            UploadEvent::Finalizing { .. } => "finalizing",
            UploadEvent::Completed { .. } => "completed",
            UploadEvent::Failed { .. } => "failed",
            UploadEvent::StorageFailed { .. } => "storage_failed",
            UploadEvent::BatchProgress { .. } => "batch_progress",
        }
    }

    /// 转换为用户通知
    ///
    /// 拒绝、完成、失败、记录失败各产生一条通知，进度类事件不产生
    pub fn notification(&self) -> Option<Notification> {
        match self {
            UploadEvent::Rejected { reason, .. } => Some(Notification {
                level: NotificationLevel::Error,
                message: reason.clone(),
            }),
            UploadEvent::Completed { file_name, .. } => Some(Notification {
                level: NotificationLevel::Success,
                message: format!("{} 上传成功", file_name),
            }),
            UploadEvent::Failed {
                file_name, error, ..
            } => Some(Notification {
                level: NotificationLevel::Error,
                message: format!("{} 上传失败: {}", file_name, error),
            }),
            UploadEvent::StorageFailed {
                file_name, error, ..
            } => Some(Notification {
                level: NotificationLevel::Warning,
                message: format!("{} 已上传，但保存本地记录失败: {}", file_name, error),
            }),
            _ => None,
        }
    }
}

/// 通知级别
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
    Success,
    Warning,
    Error,
}

/// 面向用户的通知
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Notification {
    pub level: NotificationLevel,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization_tag() {
        let event = UploadEvent::Finalizing {
            task_id: "t1".to_string(),
            batch_id: "b1".to_string(),
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["event_type"], "finalizing");
        assert_eq!(value["task_id"], "t1");

        let back: UploadEvent = serde_json::from_value(value).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn test_notifications() {
        let completed = UploadEvent::Completed {
            task_id: "t".into(),
            batch_id: "b".into(),
            file_name: "cat.png".into(),
            file: UploadedFile::default(),
        };
        let n = completed.notification().unwrap();
        assert_eq!(n.level, NotificationLevel::Success);
        assert_eq!(n.message, "cat.png 上传成功");

        let failed = UploadEvent::Failed {
            task_id: "t".into(),
            batch_id: "b".into(),
            file_name: "cat.png".into(),
            stage: "transmission".into(),
            error: "网络错误: reset".into(),
        };
        assert_eq!(
            failed.notification().unwrap().message,
            "cat.png 上传失败: 网络错误: reset"
        );

        let progress = UploadEvent::Processing {
            task_id: "t".into(),
            batch_id: "b".into(),
            chunk_index: 0,
            total_chunks: 2,
            progress: 50,
        };
        assert!(progress.notification().is_none());
        assert_eq!(progress.priority(), EventPriority::Low);
    }
}
