// 上传管理器
//
// 对外入口：准入校验 → 批次登记 → 入队

use crate::api::ImageHostApi;
use crate::config::UploadConfig;
use crate::error::ValidationError;
use crate::events::{EventBus, UploadEvent};
use crate::storage::UploadRecorder;
use crate::uploader::chunk::chunk_count;
use crate::uploader::folder::{FolderScanner, ScanOptions};
use crate::uploader::progress::{BatchProgress, ProgressTracker};
use crate::uploader::queue::UploadQueue;
use crate::uploader::task::UploadTask;
use crate::uploader::validator::{AdmissionPolicy, CandidateFile};
use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

/// 一次批量提交的结果
#[derive(Debug, Clone)]
pub struct BatchReceipt {
    pub batch_id: String,
    /// 已入队的任务ID，按提交顺序
    pub accepted: Vec<String>,
    /// 未通过准入校验的文件
    pub rejected: Vec<ValidationError>,
}

/// 上传管理器
#[derive(Clone)]
pub struct UploadManager {
    queue: UploadQueue,
    policy: AdmissionPolicy,
    chunk_size: u64,
    events: Arc<EventBus>,
    progress: Arc<ProgressTracker>,
    scan_options: ScanOptions,
}

impl UploadManager {
    /// 创建上传管理器
    pub fn new(
        api: Arc<dyn ImageHostApi>,
        config: &UploadConfig,
        recorder: Option<UploadRecorder>,
    ) -> Self {
        let events = Arc::new(EventBus::new());
        let progress = Arc::new(ProgressTracker::new());
        let chunk_size = config.chunk_size_bytes();

        let queue = UploadQueue::new(
            api,
            events.clone(),
            progress.clone(),
            recorder,
            config.max_concurrent_uploads,
            chunk_size,
            config.max_retries,
        );

        Self {
            queue,
            policy: AdmissionPolicy::from_config(config),
            chunk_size,
            events,
            progress,
            scan_options: ScanOptions {
                skip_hidden: config.skip_hidden_files,
                ..Default::default()
            },
        }
    }

    /// 订阅上传事件
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<UploadEvent> {
        self.events.subscribe()
    }

    /// 提交一批文件
    ///
    /// 逐个校验，拒绝的文件各产生一条 Rejected 事件，通过的文件按顺序入队
    pub fn submit_batch(&self, files: Vec<CandidateFile>) -> BatchReceipt {
        let batch_id = Uuid::new_v4().to_string();
        let mut admitted = Vec::new();
        let mut rejected = Vec::new();

        for file in files {
            match self.policy.check(&file) {
                Ok(()) => admitted.push(file),
                Err(e) => {
                    warn!("文件未通过校验: name={}, {}", e.file_name(), e);
                    self.events.publish(UploadEvent::Rejected {
                        file_name: file.name.clone(),
                        mime_type: file.mime_type.clone(),
                        size: file.size,
                        reason: e.to_string(),
                    });
                    rejected.push(e);
                }
            }
        }

        let expected_chunks: usize = admitted
            .iter()
            .map(|f| chunk_count(f.size, self.chunk_size))
            .sum();

        if let Some(batch) = BatchProgress::new(batch_id.clone(), admitted.len(), expected_chunks)
        {
            self.progress.register(batch);
        }

        info!(
            "提交上传批次: batch={}, 通过={}, 拒绝={}, 分片总数={}",
            batch_id,
            admitted.len(),
            rejected.len(),
            expected_chunks
        );

        let mut accepted = Vec::with_capacity(admitted.len());
        for file in admitted {
            let task = UploadTask::new(
                batch_id.clone(),
                file.name,
                file.mime_type,
                file.size,
                chunk_count(file.size, self.chunk_size),
            );
            accepted.push(task.id.clone());
            self.queue.submit(task, file.source);
        }

        BatchReceipt {
            batch_id,
            accepted,
            rejected,
        }
    }

    /// 提交本地路径，目录会被递归展开
    pub fn submit_paths(&self, paths: &[PathBuf]) -> Result<BatchReceipt> {
        let scanner = FolderScanner::with_options(self.scan_options.clone());
        let mut candidates = Vec::new();

        for path in paths {
            if path.is_dir() {
                for scanned in scanner.scan(path)? {
                    match CandidateFile::from_path(&scanned.local_path) {
                        Ok(file) => candidates.push(file),
                        Err(e) => warn!("跳过无法读取的文件: {:#}", e),
                    }
                }
            } else {
                candidates.push(CandidateFile::from_path(path)?);
            }
        }

        Ok(self.submit_batch(candidates))
    }

    pub fn task(&self, task_id: &str) -> Option<UploadTask> {
        self.queue.task(task_id)
    }

    pub fn tasks(&self) -> Vec<UploadTask> {
        self.queue.tasks()
    }

    pub fn in_flight_count(&self) -> usize {
        self.queue.in_flight_count()
    }

    pub fn pending_count(&self) -> usize {
        self.queue.pending_count()
    }

    /// 清理已结束任务的快照
    pub fn clear_finished(&self) -> usize {
        self.queue.clear_finished()
    }

    /// 等待所有已提交任务结束
    pub async fn wait_idle(&self) {
        self.queue.wait_idle().await
    }
}
