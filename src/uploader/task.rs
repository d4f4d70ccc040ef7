// 上传任务定义

use crate::api::UploadedFile;
use crate::uploader::chunk::chunk_progress;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 完成合并前的最高进度
const MAX_PROGRESS_BEFORE_FINALIZE: u8 = 99;

/// 上传任务状态
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum UploadTaskStatus {
    /// 等待中
    Pending,
    /// 已获得上传名额，准备中
    Processing,
    /// 分片上传中
    Uploading,
    /// 等待服务端合并
    Finalizing,
    /// 已完成
    Completed,
    /// 失败
    Failed,
}

impl UploadTaskStatus {
    /// 是否为终止状态
    pub fn is_terminal(&self) -> bool {
        matches!(self, UploadTaskStatus::Completed | UploadTaskStatus::Failed)
    }
}

/// 上传任务
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadTask {
    /// 任务ID（同时作为服务端的 fileId）
    pub id: String,
    /// 所属批次
    pub batch_id: String,
    /// 显示文件名
    pub name: String,
    /// 声明的 MIME 类型
    pub mime_type: String,
    /// 文件大小
    pub size: u64,
    /// 任务状态
    pub status: UploadTaskStatus,
    /// 进度百分比 0-100
    pub progress: u8,
    /// 总分片数
    pub total_chunks: usize,
    /// 已完成分片数
    pub completed_chunks: usize,
    /// 创建时间 (Unix timestamp)
    pub created_at: i64,
    /// 开始时间 (Unix timestamp)
    pub started_at: Option<i64>,
    /// 完成时间 (Unix timestamp)
    pub completed_at: Option<i64>,
    /// 错误信息
    pub error: Option<String>,
    /// 上传结果
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<UploadedFile>,
}

impl UploadTask {
    /// 创建新的上传任务
    pub fn new(
        batch_id: String,
        name: String,
        mime_type: String,
        size: u64,
        total_chunks: usize,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            batch_id,
            name,
            mime_type,
            size,
            status: UploadTaskStatus::Pending,
            progress: 0,
            total_chunks,
            completed_chunks: 0,
            created_at: chrono::Utc::now().timestamp(),
            started_at: None,
            completed_at: None,
            error: None,
            result: None,
        }
    }

    /// 标记为准备中（获得上传名额）
    pub fn mark_processing(&mut self) {
        if self.status == UploadTaskStatus::Pending {
            self.status = UploadTaskStatus::Processing;
            self.started_at = Some(chrono::Utc::now().timestamp());
        }
    }

    /// 标记为上传中
    pub fn mark_uploading(&mut self) {
        if matches!(
            self.status,
            UploadTaskStatus::Pending | UploadTaskStatus::Processing
        ) {
            if self.started_at.is_none() {
                self.started_at = Some(chrono::Utc::now().timestamp());
            }
            self.status = UploadTaskStatus::Uploading;
        }
    }

    /// 记录一个分片完成，返回最新进度
    ///
    /// 进度单调不减，合并完成前最高 99
    pub fn record_chunk(&mut self) -> u8 {
        if self.status.is_terminal() {
            return self.progress;
        }
        self.completed_chunks = (self.completed_chunks + 1).min(self.total_chunks);
        let progress = chunk_progress(self.completed_chunks, self.total_chunks)
            .min(MAX_PROGRESS_BEFORE_FINALIZE);
        self.progress = self.progress.max(progress);
        self.progress
    }

    /// 标记为合并中
    pub fn mark_finalizing(&mut self) {
        if self.status == UploadTaskStatus::Uploading {
            self.status = UploadTaskStatus::Finalizing;
        }
    }

    /// 标记为已完成
    ///
    /// 只有第一次进入终止状态时返回 true
    pub fn mark_completed(&mut self, result: UploadedFile) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = UploadTaskStatus::Completed;
        self.progress = 100;
        self.completed_at = Some(chrono::Utc::now().timestamp());
        self.result = Some(result);
        true
    }

    /// 标记为失败
    ///
    /// 只有第一次进入终止状态时返回 true
    pub fn mark_failed(&mut self, error: String) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = UploadTaskStatus::Failed;
        self.completed_at = Some(chrono::Utc::now().timestamp());
        self.error = Some(error);
        true
    }
}
