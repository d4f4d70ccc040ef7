// 分片传输
//
// 单个任务内的分片严格按顺序逐个上传：
// 1. 读取分片数据
// 2. 上传（可重试错误按指数退避重试）
// 3. 更新任务进度并推送事件
// 全部分片成功后发起一次合并请求，合并不重试

use crate::api::{ChunkUpload, ImageHostApi, MergeRequest, UploadedFile};
use crate::error::{ApiError, UploadError};
use crate::events::{EventBus, UploadEvent};
use crate::uploader::chunk::{split_chunks, UploadSource};
use crate::uploader::progress::ProgressTracker;
use crate::uploader::task::UploadTask;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// 初始退避延迟（毫秒）
const INITIAL_BACKOFF_MS: u64 = 100;

/// 最大退避延迟（毫秒）
const MAX_BACKOFF_MS: u64 = 5000;

/// 限流时的额外等待时间（毫秒）
const RATE_LIMIT_BACKOFF_MS: u64 = 10000;

/// 计算指数退避延迟
///
/// - 第 0 次重试: 100ms，之后每次翻倍，最长 5s
/// - 限流错误至少等待 10s
fn calculate_backoff_delay(retry_count: u32, error: &ApiError) -> u64 {
    let base_delay = INITIAL_BACKOFF_MS.saturating_mul(2u64.saturating_pow(retry_count));
    let delay = base_delay.min(MAX_BACKOFF_MS);

    if error.is_rate_limited() {
        delay.max(RATE_LIMIT_BACKOFF_MS)
    } else {
        delay
    }
}

/// 分片传输器
pub struct ChunkTransmitter {
    api: Arc<dyn ImageHostApi>,
    tasks: Arc<DashMap<String, UploadTask>>,
    events: Arc<EventBus>,
    progress: Arc<ProgressTracker>,
    chunk_size: u64,
    max_retries: u32,
}

impl ChunkTransmitter {
    pub fn new(
        api: Arc<dyn ImageHostApi>,
        tasks: Arc<DashMap<String, UploadTask>>,
        events: Arc<EventBus>,
        progress: Arc<ProgressTracker>,
        chunk_size: u64,
        max_retries: u32,
    ) -> Self {
        Self {
            api,
            tasks,
            events,
            progress,
            chunk_size,
            max_retries,
        }
    }

    /// 上传一个任务的全部分片并合并
    ///
    /// 返回 Err 时任务尚未标记失败，由调用方负责终止状态
    pub async fn transmit(
        &self,
        task_id: &str,
        source: &UploadSource,
    ) -> Result<UploadedFile, UploadError> {
        let snapshot = {
            let mut task = self
                .tasks
                .get_mut(task_id)
                .ok_or_else(|| UploadError::Source(format!("任务不存在: {}", task_id)))?;
            task.mark_uploading();
            task.clone()
        };

        let chunks = split_chunks(snapshot.size, self.chunk_size);
        let total_chunks = chunks.len();

        info!(
            "开始上传: task={}, name={}, size={}, chunks={}",
            task_id, snapshot.name, snapshot.size, total_chunks
        );

        for chunk in &chunks {
            let data = source
                .read_chunk(chunk)
                .await
                .map_err(|e| UploadError::Source(format!("{:#}", e)))?;

            let upload = ChunkUpload {
                file_id: snapshot.id.clone(),
                chunk_index: chunk.index,
                total_chunks,
                file_name: snapshot.name.clone(),
                file_size: snapshot.size,
                file_type: snapshot.mime_type.clone(),
                data,
            };

            self.upload_chunk_with_retry(upload).await?;

            let progress = match self.tasks.get_mut(task_id) {
                Some(mut task) => task.record_chunk(),
                None => 0,
            };

            debug!(
                "分片 #{} 上传完成: task={}, progress={}%",
                chunk.index, task_id, progress
            );

            self.events.publish(UploadEvent::Processing {
                task_id: task_id.to_string(),
                batch_id: snapshot.batch_id.clone(),
                chunk_index: chunk.index,
                total_chunks,
                progress,
            });

            if let Some(batch) = self.progress.on_chunk_completed(&snapshot.batch_id) {
                self.events.publish(UploadEvent::BatchProgress {
                    batch_id: batch.batch_id.clone(),
                    overall_progress: batch.overall_percent(),
                    completed_chunks: batch.completed_chunks,
                    expected_chunks: batch.expected_chunks,
                    finished_files: batch.finished_files,
                    total_files: batch.total_files,
                });
            }
        }

        if let Some(mut task) = self.tasks.get_mut(task_id) {
            task.mark_finalizing();
        }
        self.events.publish(UploadEvent::Finalizing {
            task_id: task_id.to_string(),
            batch_id: snapshot.batch_id.clone(),
        });

        let request = MergeRequest {
            file_id: snapshot.id.clone(),
            file_name: snapshot.name.clone(),
            file_type: snapshot.mime_type.clone(),
            total_chunks,
        };

        let mut file = self
            .api
            .merge_chunks(&request)
            .await
            .map_err(UploadError::Finalize)?;

        if file.name.is_empty() {
            file.name = snapshot.name.clone();
        }
        if file.size == 0 {
            file.size = snapshot.size;
        }

        info!("✅ 合并完成: task={}, url={}", task_id, file.url);
        Ok(file)
    }

    /// 上传单个分片（带重试）
    async fn upload_chunk_with_retry(&self, chunk: ChunkUpload) -> Result<(), UploadError> {
        let chunk_index = chunk.chunk_index;
        let mut retry = 0u32;

        loop {
            match self.api.upload_chunk(chunk.clone()).await {
                Ok(()) => return Ok(()),
                Err(e) if e.is_retriable() && retry < self.max_retries => {
                    let delay = calculate_backoff_delay(retry, &e);
                    warn!(
                        "分片 #{} 上传失败，{}ms 后重试 ({}/{}): {}",
                        chunk_index,
                        delay,
                        retry + 1,
                        self.max_retries,
                        e
                    );
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                    retry += 1;
                }
                Err(e) => {
                    warn!(
                        "分片 #{} 上传失败（不再重试）: file_id={}, {}",
                        chunk_index, chunk.file_id, e
                    );
                    return Err(UploadError::Transmission {
                        chunk_index,
                        source: e,
                    });
                }
            }
        }
    }
}
