// 图床接口数据类型

use serde::{Deserialize, Deserializer, Serialize};

/// 单个分片上传请求
#[derive(Debug, Clone)]
pub struct ChunkUpload {
    /// 任务ID（服务端用于归并分片）
    pub file_id: String,
    pub chunk_index: usize,
    pub total_chunks: usize,
    pub file_name: String,
    pub file_size: u64,
    pub file_type: String,
    /// 分片数据
    pub data: Vec<u8>,
}

/// 合并分片请求
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MergeRequest {
    pub file_id: String,
    pub file_name: String,
    pub file_type: String,
    pub total_chunks: usize,
}

/// 合并分片响应
#[derive(Debug, Clone, Deserialize)]
pub struct MergeResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub data: Option<UploadedFile>,
    #[serde(default)]
    pub error: Option<String>,
}

/// 上传完成后的文件信息
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UploadedFile {
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub size: u64,
    /// 访问地址
    #[serde(alias = "downloadUrl", alias = "downloadPage")]
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
}

/// 文件列表响应
#[derive(Debug, Clone, Deserialize)]
pub struct FileListResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub files: Vec<RemoteFile>,
    #[serde(default)]
    pub error: Option<String>,
}

/// 图库中的远端文件
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RemoteFile {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub size: u64,
    #[serde(rename = "type", default)]
    pub mime_type: String,
    #[serde(default, alias = "uploadedAt")]
    pub upload_time: String,
    #[serde(default)]
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
}

/// 删除响应
#[derive(Debug, Clone, Deserialize)]
pub struct DeleteResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
}

/// id 字段兼容字符串与数字两种写法
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Number(i64),
    }

    Ok(match Id::deserialize(deserializer)? {
        Id::Text(s) => s,
        Id::Number(n) => n.to_string(),
    })
}

fn opt_string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Number(i64),
    }

    Ok(match Option::<Id>::deserialize(deserializer)? {
        Some(Id::Text(s)) => Some(s),
        Some(Id::Number(n)) => Some(n.to_string()),
        None => None,
    })
}
