// 上传队列
//
// 同时上传的文件数不超过 limit，其余按提交顺序（FIFO）等待
// 任务进入终止状态后释放名额并立即补位

use crate::api::ImageHostApi;
use crate::events::{EventBus, UploadEvent};
use crate::storage::UploadRecorder;
use crate::uploader::chunk::UploadSource;
use crate::uploader::progress::ProgressTracker;
use crate::uploader::task::UploadTask;
use crate::uploader::transmitter::ChunkTransmitter;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::{debug, error, info, warn};

/// 等待上传的条目
#[derive(Debug, Clone)]
struct QueuedUpload {
    task_id: String,
    source: UploadSource,
}

/// 队列状态
///
/// 所有修改都在锁内一次完成，临界区内不等待
#[derive(Debug)]
struct QueueState {
    pending: VecDeque<QueuedUpload>,
    in_flight: usize,
    /// 已归还名额、尚未收尾（发布事件、写本地记录）的任务数
    settling: usize,
    limit: usize,
}

impl QueueState {
    fn new(limit: usize) -> Self {
        Self {
            pending: VecDeque::new(),
            in_flight: 0,
            settling: 0,
            limit: limit.max(1),
        }
    }

    /// 有空闲名额时取出队首并占用名额
    fn take_admissible(&mut self) -> Option<QueuedUpload> {
        if self.in_flight >= self.limit {
            return None;
        }
        let next = self.pending.pop_front()?;
        self.in_flight += 1;
        Some(next)
    }

    /// 归还一个名额，任务转入收尾
    fn release(&mut self) {
        if self.in_flight > 0 {
            self.in_flight -= 1;
            self.settling += 1;
        }
    }

    /// 收尾结束
    fn settle(&mut self) {
        self.settling = self.settling.saturating_sub(1);
    }

    fn is_idle(&self) -> bool {
        self.in_flight == 0 && self.pending.is_empty() && self.settling == 0
    }
}

/// 上传队列
#[derive(Clone)]
pub struct UploadQueue {
    state: Arc<Mutex<QueueState>>,
    tasks: Arc<DashMap<String, UploadTask>>,
    transmitter: Arc<ChunkTransmitter>,
    events: Arc<EventBus>,
    progress: Arc<ProgressTracker>,
    recorder: Option<UploadRecorder>,
    idle: Arc<Notify>,
}

impl UploadQueue {
    pub fn new(
        api: Arc<dyn ImageHostApi>,
        events: Arc<EventBus>,
        progress: Arc<ProgressTracker>,
        recorder: Option<UploadRecorder>,
        limit: usize,
        chunk_size: u64,
        max_retries: u32,
    ) -> Self {
        let tasks = Arc::new(DashMap::new());
        let transmitter = Arc::new(ChunkTransmitter::new(
            api,
            tasks.clone(),
            events.clone(),
            progress.clone(),
            chunk_size,
            max_retries,
        ));

        info!("创建上传队列: 最大同时上传数={}, 分片大小={}", limit, chunk_size);

        Self {
            state: Arc::new(Mutex::new(QueueState::new(limit))),
            tasks,
            transmitter,
            events,
            progress,
            recorder,
            idle: Arc::new(Notify::new()),
        }
    }

    /// 提交任务：加入等待队列并尝试启动
    pub fn submit(&self, task: UploadTask, source: UploadSource) {
        let task_id = task.id.clone();

        self.events.publish(UploadEvent::Queued {
            task_id: task_id.clone(),
            batch_id: task.batch_id.clone(),
            file_name: task.name.clone(),
            size: task.size,
            total_chunks: task.total_chunks,
        });

        self.tasks.insert(task_id.clone(), task);
        self.state
            .lock()
            .pending
            .push_back(QueuedUpload { task_id, source });

        self.advance();
    }

    /// 在名额允许时按顺序启动等待中的任务
    ///
    /// 可重复调用，没有空闲名额或没有等待任务时什么也不做
    pub fn advance(&self) {
        loop {
            let next = self.state.lock().take_admissible();
            let Some(job) = next else {
                break;
            };

            let queue = self.clone();
            tokio::spawn(async move {
                queue.run(job).await;
            });
        }
    }

    async fn run(&self, job: QueuedUpload) {
        let started = self.tasks.get_mut(&job.task_id).map(|mut task| {
            task.mark_processing();
            (task.batch_id.clone(), task.name.clone())
        });

        let Some((batch_id, file_name)) = started else {
            warn!("任务已不存在，跳过: {}", job.task_id);
            self.release_slot();
            self.settle();
            return;
        };

        debug!("任务开始上传: task={}, name={}", job.task_id, file_name);
        self.events.publish(UploadEvent::Started {
            task_id: job.task_id.clone(),
            batch_id: batch_id.clone(),
            file_name: file_name.clone(),
        });

        let outcome = self.transmitter.transmit(&job.task_id, &job.source).await;

        // 进入终止状态后立刻归还名额，本地记录在名额之外完成
        let to_record = match outcome {
            Ok(file) => {
                let completed = self
                    .tasks
                    .get_mut(&job.task_id)
                    .and_then(|mut task| task.mark_completed(file.clone()).then(|| task.clone()));
                self.release_slot();

                if completed.is_some() {
                    info!("🎉 上传成功: name={}, url={}", file_name, file.url);
                    self.events.publish(UploadEvent::Completed {
                        task_id: job.task_id.clone(),
                        batch_id: batch_id.clone(),
                        file_name: file_name.clone(),
                        file,
                    });
                }
                completed
            }
            Err(e) => {
                let marked = self
                    .tasks
                    .get_mut(&job.task_id)
                    .map(|mut task| task.mark_failed(e.to_string()))
                    .unwrap_or(false);
                self.release_slot();

                if marked {
                    error!("❌ 上传失败: name={}, stage={}, {}", file_name, e.stage(), e);
                    self.events.publish(UploadEvent::Failed {
                        task_id: job.task_id.clone(),
                        batch_id: batch_id.clone(),
                        file_name: file_name.clone(),
                        stage: e.stage().to_string(),
                        error: e.to_string(),
                    });
                }
                None
            }
        };

        if let Some(batch) = self.progress.on_file_finished(&batch_id) {
            self.events.publish(UploadEvent::BatchProgress {
                batch_id: batch.batch_id.clone(),
                overall_progress: batch.overall_percent(),
                completed_chunks: batch.completed_chunks,
                expected_chunks: batch.expected_chunks,
                finished_files: batch.finished_files,
                total_files: batch.total_files,
            });
            if batch.is_finished() {
                info!(
                    "批次上传结束: batch={}, 文件数={}",
                    batch.batch_id, batch.total_files
                );
            }
        }

        if let (Some(task), Some(recorder)) = (to_record, &self.recorder) {
            if let Err(e) = recorder.record(&task, &job.source).await {
                error!("保存本地记录失败: name={}, {}", file_name, e);
                self.events.publish(UploadEvent::StorageFailed {
                    task_id: job.task_id.clone(),
                    file_name: file_name.clone(),
                    error: e.to_string(),
                });
            }
        }

        self.settle();
    }

    /// 归还名额并补位
    fn release_slot(&self) {
        self.state.lock().release();
        self.advance();
    }

    /// 收尾结束，队列清空时唤醒等待者
    fn settle(&self) {
        let idle = {
            let mut state = self.state.lock();
            state.settle();
            state.is_idle()
        };
        if idle {
            self.idle.notify_waiters();
        }
    }

    pub fn in_flight_count(&self) -> usize {
        self.state.lock().in_flight
    }

    pub fn pending_count(&self) -> usize {
        self.state.lock().pending.len()
    }

    /// 任务快照
    pub fn task(&self, task_id: &str) -> Option<UploadTask> {
        self.tasks.get(task_id).map(|t| t.clone())
    }

    /// 全部任务快照，按创建时间排序
    pub fn tasks(&self) -> Vec<UploadTask> {
        let mut tasks: Vec<UploadTask> = self.tasks.iter().map(|e| e.value().clone()).collect();
        tasks.sort_by_key(|t| t.created_at);
        tasks
    }

    /// 移除已结束（成功或失败）的任务快照，返回移除数量
    pub fn clear_finished(&self) -> usize {
        let before = self.tasks.len();
        self.tasks.retain(|_, task| !task.status.is_terminal());
        let removed = before.saturating_sub(self.tasks.len());
        if removed > 0 {
            debug!("清理已结束任务: {}", removed);
        }
        removed
    }

    /// 等待所有任务结束，包括本地记录的写入
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            if self.state.lock().is_idle() {
                return;
            }
            notified.await;
        }
    }
}
