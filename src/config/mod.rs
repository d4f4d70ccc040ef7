// 配置管理模块

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::fs;

const MB: u64 = 1024 * 1024;

/// 应用配置
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    /// 图床服务接口配置
    #[serde(default)]
    pub api: ApiConfig,
    /// 上传配置
    #[serde(default)]
    pub upload: UploadConfig,
    /// 图库配置
    #[serde(default)]
    pub gallery: GalleryConfig,
    /// 本地记录配置
    #[serde(default)]
    pub storage: StorageConfig,
    /// 🔥 日志配置
    #[serde(default)]
    pub log: LogConfig,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// 是否启用日志文件持久化
    #[serde(default = "default_log_enabled")]
    pub enabled: bool,
    /// 日志文件保存目录
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
    /// 日志保留天数（默认 7 天）
    #[serde(default = "default_log_retention_days")]
    pub retention_days: u32,
    /// 日志级别（默认 info）
    #[serde(default = "default_log_level")]
    pub level: String,
    /// 单个日志文件最大大小（字节，默认 50MB）
    #[serde(default = "default_log_max_file_size")]
    pub max_file_size: u64,
}

fn default_log_enabled() -> bool {
    true
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

fn default_log_retention_days() -> u32 {
    7
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_max_file_size() -> u64 {
    50 * MB
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            enabled: default_log_enabled(),
            log_dir: default_log_dir(),
            retention_days: default_log_retention_days(),
            level: default_log_level(),
            max_file_size: default_log_max_file_size(),
        }
    }
}

/// 图床服务接口配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// 服务根地址
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// 单次请求超时（秒）
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// 分片上传接口
    #[serde(default = "default_upload_chunk_path")]
    pub upload_chunk_path: String,
    /// 分片合并接口
    #[serde(default = "default_merge_path")]
    pub merge_path: String,
    /// 文件列表 / 删除接口
    #[serde(default = "default_files_path")]
    pub files_path: String,
}

fn default_base_url() -> String {
    "http://127.0.0.1:8080".to_string()
}

fn default_request_timeout_secs() -> u64 {
    60
}

fn default_upload_chunk_path() -> String {
    "/api/upload-chunk".to_string()
}

fn default_merge_path() -> String {
    "/api/merge-chunks".to_string()
}

fn default_files_path() -> String {
    "/api/files".to_string()
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_secs: default_request_timeout_secs(),
            upload_chunk_path: default_upload_chunk_path(),
            merge_path: default_merge_path(),
            files_path: default_files_path(),
        }
    }
}

/// 上传配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    /// 允许上传的 MIME 类型
    #[serde(default = "default_allowed_types")]
    pub allowed_types: Vec<String>,
    /// 单文件大小上限 (MB)
    #[serde(default = "default_max_file_size_mb")]
    pub max_file_size_mb: u64,
    /// 分片大小 (MB)
    #[serde(default = "default_chunk_size_mb")]
    pub chunk_size_mb: u64,
    /// 最大同时上传文件数
    #[serde(default = "default_max_concurrent_uploads")]
    pub max_concurrent_uploads: usize,
    /// 单个分片最大重试次数
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// 上传文件夹时是否跳过隐藏文件（以.开头的文件/文件夹）
    #[serde(default)]
    pub skip_hidden_files: bool,
}

fn default_allowed_types() -> Vec<String> {
    [
        "image/jpeg",
        "image/png",
        "image/gif",
        "image/webp",
        "image/svg+xml",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_max_file_size_mb() -> u64 {
    20
}

fn default_chunk_size_mb() -> u64 {
    5
}

fn default_max_concurrent_uploads() -> usize {
    3
}

fn default_max_retries() -> u32 {
    2
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            allowed_types: default_allowed_types(),
            max_file_size_mb: default_max_file_size_mb(),
            chunk_size_mb: default_chunk_size_mb(),
            max_concurrent_uploads: default_max_concurrent_uploads(),
            max_retries: default_max_retries(),
            skip_hidden_files: false,
        }
    }
}

impl UploadConfig {
    /// 单文件大小上限（字节）
    pub fn max_file_size_bytes(&self) -> u64 {
        self.max_file_size_mb * MB
    }

    /// 分片大小（字节）
    pub fn chunk_size_bytes(&self) -> u64 {
        self.chunk_size_mb * MB
    }

    /// 校验上传配置
    ///
    /// 返回 Err 时携带可直接展示给用户的说明
    pub fn validate(&self) -> Result<(), String> {
        if self.allowed_types.is_empty() {
            return Err("允许上传的文件类型列表不能为空".to_string());
        }
        if self.chunk_size_mb == 0 {
            return Err("分片大小必须大于 0MB".to_string());
        }
        if self.max_file_size_mb == 0 {
            return Err("单文件大小上限必须大于 0MB".to_string());
        }
        if self.max_concurrent_uploads == 0 {
            return Err("最大同时上传文件数至少为 1".to_string());
        }
        if self.max_retries > 10 {
            return Err(format!(
                "最大重试次数 {} 过大，建议不超过 10",
                self.max_retries
            ));
        }
        Ok(())
    }
}

/// 图库配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GalleryConfig {
    /// 每页显示数量
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

fn default_page_size() -> usize {
    8
}

impl Default for GalleryConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
        }
    }
}

/// 本地记录配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// 上传完成后是否写入本地记录
    #[serde(default = "default_storage_enabled")]
    pub enabled: bool,
    /// SQLite 数据库路径
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
    /// 缩略图目录，None 表示不生成缩略图
    #[serde(default = "default_thumbnail_dir")]
    pub thumbnail_dir: Option<PathBuf>,
    /// 缩略图最大边长（像素）
    #[serde(default = "default_thumbnail_max_edge")]
    pub thumbnail_max_edge: u32,
}

fn default_storage_enabled() -> bool {
    true
}

fn default_db_path() -> PathBuf {
    PathBuf::from("data/images.db")
}

fn default_thumbnail_dir() -> Option<PathBuf> {
    Some(PathBuf::from("data/thumbs"))
}

fn default_thumbnail_max_edge() -> u32 {
    200
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            enabled: default_storage_enabled(),
            db_path: default_db_path(),
            thumbnail_dir: default_thumbnail_dir(),
            thumbnail_max_edge: default_thumbnail_max_edge(),
        }
    }
}

impl AppConfig {
    /// 从文件加载配置
    pub async fn load_from_file(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .context("Failed to read config file")?;

        let config: AppConfig = toml::from_str(&content).context("Failed to parse config file")?;

        config
            .upload
            .validate()
            .map_err(|e| anyhow::anyhow!("配置文件中的上传配置无效: {}", e))?;

        Ok(config)
    }

    /// 保存配置到文件
    pub async fn save_to_file(&self, path: &str) -> Result<()> {
        self.upload
            .validate()
            .map_err(|e| anyhow::anyhow!("保存配置失败：{}", e))?;

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;

        // 确保父目录存在
        if let Some(parent) = std::path::Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .await
                    .context("Failed to create config directory")?;
            }
        }

        fs::write(path, content)
            .await
            .context("Failed to write config file")?;

        tracing::info!("✓ 配置已保存: {}", path);
        Ok(())
    }

    /// 加载或创建默认配置
    ///
    /// 文件不存在时写入默认配置；文件存在但无法解析或校验失败时保留原文件，仅在内存中使用默认配置
    pub async fn load_or_default(path: &str) -> Self {
        match fs::try_exists(path).await {
            Ok(false) => {
                tracing::info!("配置文件不存在，创建默认配置: {}", path);
                let default_config = Self::default();
                if let Err(e) = default_config.save_to_file(path).await {
                    tracing::error!("保存默认配置失败: {}", e);
                }
                return default_config;
            }
            Ok(true) => {}
            Err(e) => tracing::warn!("无法确认配置文件是否存在: {}, {}", path, e),
        }

        match Self::load_from_file(path).await {
            Ok(config) => {
                tracing::info!("配置文件加载成功: {}", path);
                config
            }
            Err(e) => {
                tracing::error!(
                    "⚠️ 配置文件无效，本次使用默认配置（原文件未改动）: {}, {:#}",
                    path,
                    e
                );
                Self::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.upload.max_file_size_bytes(), 20 * 1024 * 1024);
        assert_eq!(config.upload.chunk_size_bytes(), 5 * 1024 * 1024);
        assert_eq!(config.upload.max_concurrent_uploads, 3);
        assert_eq!(config.gallery.page_size, 8);
        assert_eq!(config.api.merge_path, "/api/merge-chunks");
        assert!(config.upload.validate().is_ok());
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let temp_file = NamedTempFile::new().unwrap();
        let path = temp_file.path().to_str().unwrap();

        let mut config = AppConfig::default();
        config.upload.max_concurrent_uploads = 5;
        config.api.base_url = "https://img.example.com".to_string();
        config.save_to_file(path).await.unwrap();

        let loaded = AppConfig::load_from_file(path).await.unwrap();
        assert_eq!(loaded.upload.max_concurrent_uploads, 5);
        assert_eq!(loaded.api.base_url, "https://img.example.com");
        assert_eq!(loaded.upload.allowed_types, config.upload.allowed_types);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            [upload]
            chunk_size_mb = 2

            [gallery]
            page_size = 5
            "#,
        )
        .unwrap();

        assert_eq!(config.upload.chunk_size_mb, 2);
        assert_eq!(config.upload.max_file_size_mb, 20);
        assert_eq!(config.gallery.page_size, 5);
        assert_eq!(config.api.upload_chunk_path, "/api/upload-chunk");
        assert!(config.log.enabled);
    }

    #[test]
    fn test_upload_config_validation() {
        let mut config = UploadConfig::default();
        config.chunk_size_mb = 0;
        assert!(config.validate().is_err());

        let mut config = UploadConfig::default();
        config.max_concurrent_uploads = 0;
        assert!(config.validate().is_err());

        let mut config = UploadConfig::default();
        config.allowed_types.clear();
        assert!(config.validate().is_err());
    }

    #[tokio::test]
    async fn test_invalid_file_rejected() {
        let temp_file = NamedTempFile::new().unwrap();
        let path = temp_file.path().to_str().unwrap();
        std::fs::write(path, "[upload]\nmax_concurrent_uploads = 0\n").unwrap();

        assert!(AppConfig::load_from_file(path).await.is_err());
    }

    #[tokio::test]
    async fn test_invalid_file_left_untouched() {
        let temp_file = NamedTempFile::new().unwrap();
        let path = temp_file.path().to_str().unwrap();
        let original = "[api]\nbase_url = \"https://my.host\"\n\n[upload]\nchunk_size_mb = 0\n";
        std::fs::write(path, original).unwrap();

        let config = AppConfig::load_or_default(path).await;
        assert_eq!(config.api.base_url, "http://127.0.0.1:8080");
        assert_eq!(config.upload.chunk_size_mb, 5);
        assert_eq!(std::fs::read_to_string(path).unwrap(), original);

        std::fs::write(path, "not = [valid toml").unwrap();
        AppConfig::load_or_default(path).await;
        assert_eq!(std::fs::read_to_string(path).unwrap(), "not = [valid toml");
    }

    #[tokio::test]
    async fn test_missing_file_gets_defaults_written() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("conf").join("app.toml");
        let path = path.to_str().unwrap();

        let config = AppConfig::load_or_default(path).await;
        assert_eq!(config.upload.max_concurrent_uploads, 3);

        let reloaded = AppConfig::load_from_file(path).await.unwrap();
        assert_eq!(reloaded.api.base_url, config.api.base_url);
        assert_eq!(reloaded.gallery.page_size, 8);
    }
}
