// 图床客户端实现

use super::types::{
    ChunkUpload, DeleteResponse, FileListResponse, MergeRequest, MergeResponse, RemoteFile,
    UploadedFile,
};
use super::ImageHostApi;
use crate::config::ApiConfig;
use crate::error::ApiError;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::multipart;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// 图床 HTTP 客户端
#[derive(Debug, Clone)]
pub struct ImageHostClient {
    client: Client,
    base_url: String,
    upload_chunk_path: String,
    merge_path: String,
    files_path: String,
}

impl ImageHostClient {
    /// 创建客户端
    ///
    /// 所有请求共用同一个超时，超时按传输错误处理
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(concat!("picbed-rust/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("创建 HTTP 客户端失败")?;

        info!(
            "初始化图床客户端: base_url={}, timeout={}s",
            config.base_url, config.request_timeout_secs
        );

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            upload_chunk_path: config.upload_chunk_path.clone(),
            merge_path: config.merge_path.clone(),
            files_path: config.files_path.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl ImageHostApi for ImageHostClient {
    async fn upload_chunk(&self, chunk: ChunkUpload) -> Result<(), ApiError> {
        let url = self.url(&self.upload_chunk_path);

        debug!(
            "上传分片: file_id={}, chunk={}/{}, size={}",
            chunk.file_id,
            chunk.chunk_index + 1,
            chunk.total_chunks,
            chunk.data.len()
        );

        let part = multipart::Part::bytes(chunk.data)
            .file_name(chunk.file_name.clone())
            .mime_str("application/octet-stream")
            .map_err(ApiError::from_reqwest)?;

        let form = multipart::Form::new()
            .part("file", part)
            .text("fileId", chunk.file_id.clone())
            .text("chunkIndex", chunk.chunk_index.to_string())
            .text("totalChunks", chunk.total_chunks.to_string())
            .text("fileName", chunk.file_name)
            .text("fileSize", chunk.file_size.to_string())
            .text("fileType", chunk.file_type);

        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(ApiError::from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(
                "上传分片失败: file_id={}, chunk={}, status={}, body={}",
                chunk.file_id, chunk.chunk_index, status, body
            );
            return Err(ApiError::from_status_body(status, &body));
        }

        Ok(())
    }

    async fn merge_chunks(&self, request: &MergeRequest) -> Result<UploadedFile, ApiError> {
        let url = self.url(&self.merge_path);

        info!(
            "请求合并分片: file_id={}, name={}, chunks={}",
            request.file_id, request.file_name, request.total_chunks
        );

        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(ApiError::from_reqwest)?;

        let status = response.status();
        let response_text = response.text().await.map_err(ApiError::from_reqwest)?;

        debug!("合并分片响应: status={}, body={}", status, response_text);

        if !status.is_success() {
            // 服务端可能在错误状态下仍返回带 error 字段的 JSON
            if let Ok(body) = serde_json::from_str::<MergeResponse>(&response_text) {
                if let Some(message) = body.error {
                    return Err(ApiError::Rejected(message));
                }
            }
            return Err(ApiError::from_status_body(status, &response_text));
        }

        let merge: MergeResponse = serde_json::from_str(&response_text).map_err(|e| {
            error!("解析合并响应失败: {}, body={}", e, response_text);
            ApiError::Decode(e.to_string())
        })?;

        if !merge.success {
            let message = merge.error.unwrap_or_else(|| "合并失败".to_string());
            return Err(ApiError::Rejected(message));
        }

        merge
            .data
            .ok_or_else(|| ApiError::Decode("合并响应缺少文件信息".to_string()))
    }

    async fn list_files(&self) -> Result<Vec<RemoteFile>, ApiError> {
        let url = self.url(&self.files_path);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(ApiError::from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::from_status_body(status, &body));
        }

        let list: FileListResponse = response.json().await.map_err(ApiError::from_reqwest)?;
        if !list.success {
            return Err(ApiError::Rejected(
                list.error.unwrap_or_else(|| "加载文件列表失败".to_string()),
            ));
        }

        debug!("获取文件列表成功: {} 个文件", list.files.len());
        Ok(list.files)
    }

    async fn delete_file(&self, id: &str) -> Result<(), ApiError> {
        let url = format!(
            "{}/{}",
            self.url(&self.files_path),
            urlencoding::encode(id)
        );

        info!("删除远端文件: id={}", id);

        let response = self
            .client
            .delete(&url)
            .send()
            .await
            .map_err(ApiError::from_reqwest)?;

        let status = response.status();
        let response_text = response.text().await.map_err(ApiError::from_reqwest)?;

        if !status.is_success() {
            return Err(ApiError::from_status_body(status, &response_text));
        }

        // 部分服务端删除成功时返回空响应体
        if response_text.trim().is_empty() {
            return Ok(());
        }

        let body: DeleteResponse = serde_json::from_str(&response_text)
            .map_err(|e| ApiError::Decode(e.to_string()))?;
        if !body.success {
            return Err(ApiError::Rejected(
                body.error.unwrap_or_else(|| "删除失败".to_string()),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_join_strips_trailing_slash() {
        let config = ApiConfig {
            base_url: "https://img.example.com/".to_string(),
            ..ApiConfig::default()
        };
        let client = ImageHostClient::new(&config).unwrap();
        assert_eq!(
            client.url(&client.merge_path),
            "https://img.example.com/api/merge-chunks"
        );
    }
}
