// Picbed Rust Library
// 分片上传图床客户端核心库

// 配置管理模块
pub mod config;

// 日志模块
pub mod logging;

// 错误类型
pub mod error;

// 图床API模块
pub mod api;

// 上传引擎模块
pub mod uploader;

// 上传事件模块
pub mod events;

// 图库模块
pub mod gallery;

// 本地图片记录模块
pub mod storage;

// 图片尺寸与缩略图
pub mod imaging;

// 公共模块
pub mod common;

// 导出常用类型
pub use api::{ImageHostApi, ImageHostClient, RemoteFile, UploadedFile};
pub use config::AppConfig;
pub use error::{ApiError, UploadError, ValidationError};
pub use events::{EventBus, Notification, UploadEvent};
pub use gallery::Gallery;
pub use storage::{ImageRecord, ImageStore, UploadRecorder};
pub use uploader::{
    CandidateFile, UploadManager, UploadQueue, UploadTask, UploadTaskStatus,
};
