// 批次进度汇总

use crate::uploader::chunk::chunk_progress;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

/// 单个批次的进度
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BatchProgress {
    pub batch_id: String,
    /// 批次内准入的文件数
    pub total_files: usize,
    /// 已进入终止状态的文件数
    pub finished_files: usize,
    /// 准入时计算的分片总数
    pub expected_chunks: usize,
    /// 已完成的分片数
    pub completed_chunks: usize,
}

impl BatchProgress {
    /// 创建批次进度，分片总数为 0 时返回 None
    pub fn new(batch_id: String, total_files: usize, expected_chunks: usize) -> Option<Self> {
        if total_files == 0 || expected_chunks == 0 {
            return None;
        }
        Some(Self {
            batch_id,
            total_files,
            finished_files: 0,
            expected_chunks,
            completed_chunks: 0,
        })
    }

    /// 总体进度百分比（四舍五入）
    pub fn overall_percent(&self) -> u8 {
        chunk_progress(self.completed_chunks, self.expected_chunks)
    }

    pub fn is_finished(&self) -> bool {
        self.finished_files >= self.total_files
    }
}

/// 所有活跃批次的进度表
#[derive(Debug, Default)]
pub struct ProgressTracker {
    batches: DashMap<String, BatchProgress>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// 登记新批次
    pub fn register(&self, progress: BatchProgress) {
        self.batches.insert(progress.batch_id.clone(), progress);
    }

    /// 记录一个分片完成，返回批次快照
    pub fn on_chunk_completed(&self, batch_id: &str) -> Option<BatchProgress> {
        let mut entry = self.batches.get_mut(batch_id)?;
        entry.completed_chunks = (entry.completed_chunks + 1).min(entry.expected_chunks);
        Some(entry.clone())
    }

    /// 记录一个文件进入终止状态，返回批次快照
    ///
    /// 批次内文件全部结束后移除该批次
    pub fn on_file_finished(&self, batch_id: &str) -> Option<BatchProgress> {
        let snapshot = {
            let mut entry = self.batches.get_mut(batch_id)?;
            entry.finished_files = (entry.finished_files + 1).min(entry.total_files);
            entry.clone()
        };

        if snapshot.is_finished() {
            self.batches.remove(batch_id);
        }
        Some(snapshot)
    }

    /// 活跃批次数量
    pub fn active_batches(&self) -> usize {
        self.batches.len()
    }
}
