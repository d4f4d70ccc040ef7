// 图床接口模块

pub mod client;
pub mod types;

#[cfg(test)]
pub(crate) mod mock;

pub use client::ImageHostClient;
pub use types::*;

use crate::error::ApiError;
use async_trait::async_trait;

/// 图床远端接口
///
/// 上传队列与图库只依赖这个 trait，测试中可替换为内存实现
#[async_trait]
pub trait ImageHostApi: Send + Sync {
    /// 上传单个分片，2xx 即成功
    async fn upload_chunk(&self, chunk: ChunkUpload) -> Result<(), ApiError>;

    /// 通知服务端合并全部分片
    async fn merge_chunks(&self, request: &MergeRequest) -> Result<UploadedFile, ApiError>;

    /// 获取图库文件列表
    async fn list_files(&self) -> Result<Vec<RemoteFile>, ApiError>;

    /// 删除远端文件
    async fn delete_file(&self, id: &str) -> Result<(), ApiError>;
}
