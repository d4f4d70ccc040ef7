// 上传准入校验

use crate::config::UploadConfig;
use crate::error::ValidationError;
use crate::uploader::chunk::UploadSource;
use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;

const MB: u64 = 1024 * 1024;

/// 待上传文件
#[derive(Debug, Clone)]
pub struct CandidateFile {
    /// 显示文件名
    pub name: String,
    /// 声明的 MIME 类型
    pub mime_type: String,
    /// 文件大小
    pub size: u64,
    /// 数据来源
    pub source: UploadSource,
}

impl CandidateFile {
    /// 从本地文件创建，MIME 类型按扩展名推断
    pub fn from_path(path: &Path) -> Result<Self> {
        let metadata =
            std::fs::metadata(path).with_context(|| format!("读取文件信息失败: {:?}", path))?;

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.to_string_lossy().to_string());

        let mime_type = mime_guess::from_path(path)
            .first_or_octet_stream()
            .essence_str()
            .to_string();

        Ok(Self {
            name,
            mime_type,
            size: metadata.len(),
            source: UploadSource::File(path.to_path_buf()),
        })
    }

    /// 从内存数据创建
    pub fn from_bytes(name: impl Into<String>, mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        let data: Arc<[u8]> = Arc::from(data);
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            size: data.len() as u64,
            source: UploadSource::Memory(data),
        }
    }
}

/// 准入策略：类型白名单 + 大小上限
#[derive(Debug, Clone)]
pub struct AdmissionPolicy {
    allowed_types: Vec<String>,
    max_file_size: u64,
}

impl AdmissionPolicy {
    pub fn new(allowed_types: Vec<String>, max_file_size: u64) -> Self {
        Self {
            allowed_types: allowed_types
                .into_iter()
                .map(|t| t.to_ascii_lowercase())
                .collect(),
            max_file_size,
        }
    }

    pub fn from_config(config: &UploadConfig) -> Self {
        Self::new(config.allowed_types.clone(), config.max_file_size_bytes())
    }

    /// 校验单个文件
    ///
    /// 依次检查类型、大小、是否为空
    pub fn check(&self, file: &CandidateFile) -> Result<(), ValidationError> {
        let mime_type = file.mime_type.to_ascii_lowercase();
        if !self.allowed_types.iter().any(|t| *t == mime_type) {
            return Err(ValidationError::UnsupportedType {
                name: file.name.clone(),
                mime_type: file.mime_type.clone(),
            });
        }

        if file.size > self.max_file_size {
            return Err(ValidationError::TooLarge {
                name: file.name.clone(),
                size: file.size,
                limit_mb: self.max_file_size.div_ceil(MB),
            });
        }

        if file.size == 0 {
            return Err(ValidationError::Empty {
                name: file.name.clone(),
            });
        }

        Ok(())
    }
}
