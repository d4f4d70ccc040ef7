// 测试用内存图床

use super::types::{ChunkUpload, MergeRequest, RemoteFile, UploadedFile};
use super::ImageHostApi;
use crate::error::ApiError;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::Semaphore;

/// 收到的分片
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedChunk {
    pub file_id: String,
    pub file_name: String,
    pub chunk_index: usize,
    pub total_chunks: usize,
    pub len: usize,
}

#[derive(Default)]
pub struct MockHost {
    pub chunks: Mutex<Vec<ReceivedChunk>>,
    pub merges: Mutex<Vec<MergeRequest>>,
    pub files: Mutex<Vec<RemoteFile>>,
    /// (文件名, 分片索引, 错误)：该分片每次都失败
    fail_chunk: Mutex<Option<(String, usize, ApiError)>>,
    /// 前 N 次分片请求返回网络错误
    transient_failures: Mutex<usize>,
    merge_error: Mutex<Option<ApiError>>,
    /// 分片请求需先拿到许可，用于在测试中挂起上传
    gate: Option<Arc<Semaphore>>,
}

impl MockHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// 挂起所有分片请求，直到 gate 放行
    pub fn gated() -> (Self, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        let host = Self {
            gate: Some(gate.clone()),
            ..Self::default()
        };
        (host, gate)
    }

    pub fn fail_chunk(&self, file_name: &str, chunk_index: usize, error: ApiError) {
        *self.fail_chunk.lock() = Some((file_name.to_string(), chunk_index, error));
    }

    pub fn fail_transiently(&self, times: usize) {
        *self.transient_failures.lock() = times;
    }

    pub fn fail_merge(&self, error: ApiError) {
        *self.merge_error.lock() = Some(error);
    }

    pub fn chunks_for(&self, file_name: &str) -> Vec<ReceivedChunk> {
        self.chunks
            .lock()
            .iter()
            .filter(|c| c.file_name == file_name)
            .cloned()
            .collect()
    }

    pub fn merge_count_for(&self, file_name: &str) -> usize {
        self.merges
            .lock()
            .iter()
            .filter(|m| m.file_name == file_name)
            .count()
    }
}

#[async_trait]
impl ImageHostApi for MockHost {
    async fn upload_chunk(&self, chunk: ChunkUpload) -> Result<(), ApiError> {
        if let Some(gate) = &self.gate {
            let _permit = gate
                .acquire()
                .await
                .map_err(|_| ApiError::Network("gate closed".into()))?;
        }

        {
            let mut remaining = self.transient_failures.lock();
            if *remaining > 0 {
                *remaining -= 1;
                return Err(ApiError::Network("connection reset".into()));
            }
        }

        if let Some((name, index, error)) = self.fail_chunk.lock().clone() {
            if name == chunk.file_name && index == chunk.chunk_index {
                return Err(error);
            }
        }

        self.chunks.lock().push(ReceivedChunk {
            file_id: chunk.file_id,
            file_name: chunk.file_name,
            chunk_index: chunk.chunk_index,
            total_chunks: chunk.total_chunks,
            len: chunk.data.len(),
        });
        Ok(())
    }

    async fn merge_chunks(&self, request: &MergeRequest) -> Result<UploadedFile, ApiError> {
        self.merges.lock().push(request.clone());

        if let Some(error) = self.merge_error.lock().clone() {
            return Err(error);
        }

        Ok(UploadedFile {
            id: Some(request.file_id.clone()),
            name: request.file_name.clone(),
            size: 0,
            url: format!("https://img.example.com/{}", request.file_name),
            thumbnail_url: None,
        })
    }

    async fn list_files(&self) -> Result<Vec<RemoteFile>, ApiError> {
        Ok(self.files.lock().clone())
    }

    async fn delete_file(&self, id: &str) -> Result<(), ApiError> {
        let mut files = self.files.lock();
        let before = files.len();
        files.retain(|f| f.id != id);
        if files.len() == before {
            return Err(ApiError::Rejected("文件不存在".into()));
        }
        Ok(())
    }
}
