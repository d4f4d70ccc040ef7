//! 错误类型定义
//!
//! - `ValidationError`：入队前的准入校验失败，按文件上报，不重试
//! - `ApiError`：图床接口调用失败
//! - `UploadError`：单个上传任务的终止原因

use thiserror::Error;

/// 准入校验错误
///
/// Display 文本直接作为通知消息展示
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("文件 {name} 类型不支持")]
    UnsupportedType { name: String, mime_type: String },

    #[error("文件 {name} 超过{limit_mb}MB限制")]
    TooLarge {
        name: String,
        size: u64,
        limit_mb: u64,
    },

    #[error("文件 {name} 为空")]
    Empty { name: String },
}

impl ValidationError {
    /// 被拒绝的文件名
    pub fn file_name(&self) -> &str {
        match self {
            ValidationError::UnsupportedType { name, .. }
            | ValidationError::TooLarge { name, .. }
            | ValidationError::Empty { name } => name,
        }
    }
}

/// 图床接口错误
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApiError {
    /// 连接失败、连接被重置等
    #[error("网络错误: {0}")]
    Network(String),

    #[error("请求超时")]
    Timeout,

    /// 非 2xx 响应，message 为状态描述原文
    #[error("上传失败: {message}")]
    Status { status: u16, message: String },

    /// 服务端明确返回失败（success=false）
    #[error("{0}")]
    Rejected(String),

    #[error("响应解析失败: {0}")]
    Decode(String),
}

impl ApiError {
    /// 由 HTTP 状态码构造，状态描述取标准原因短语
    pub fn from_status(status: reqwest::StatusCode) -> Self {
        let message = match status.canonical_reason() {
            Some(reason) => reason.to_string(),
            None => status.as_u16().to_string(),
        };
        ApiError::Status {
            status: status.as_u16(),
            message,
        }
    }

    /// 由错误状态码和响应体构造
    ///
    /// 响应体是带 error / message 字段的 JSON 时使用服务端给出的原因
    pub fn from_status_body(status: reqwest::StatusCode, body: &str) -> Self {
        let server_message = serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|value| {
                ["error", "message"].iter().find_map(|key| {
                    value
                        .get(*key)
                        .and_then(|v| v.as_str())
                        .map(str::trim)
                        .filter(|m| !m.is_empty())
                        .map(str::to_string)
                })
            });

        match server_message {
            Some(message) => ApiError::Status {
                status: status.as_u16(),
                message,
            },
            None => ApiError::from_status(status),
        }
    }

    /// 由 reqwest 错误转换
    pub fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiError::Timeout
        } else if err.is_decode() {
            ApiError::Decode(err.to_string())
        } else if let Some(status) = err.status() {
            ApiError::from_status(status)
        } else {
            ApiError::Network(err.to_string())
        }
    }

    /// 是否可重试：网络错误、超时、5xx、429
    pub fn is_retriable(&self) -> bool {
        match self {
            ApiError::Network(_) | ApiError::Timeout => true,
            ApiError::Status { status, .. } => *status >= 500 || *status == 429,
            ApiError::Rejected(_) | ApiError::Decode(_) => false,
        }
    }

    /// 是否被限流
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, ApiError::Status { status: 429, .. })
    }
}

/// 上传任务失败原因
///
/// Display 保留底层原因原文，不额外包装
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum UploadError {
    /// 分片传输失败（重试耗尽或不可重试）
    #[error("{source}")]
    Transmission {
        chunk_index: usize,
        #[source]
        source: ApiError,
    },

    /// 合并请求失败或被服务端拒绝
    #[error("{0}")]
    Finalize(#[source] ApiError),

    /// 读取本地数据失败
    #[error("读取文件失败: {0}")]
    Source(String),

    /// 写入本地记录失败（不影响已完成的上传）
    #[error("保存图片记录失败: {0}")]
    Storage(String),
}

impl UploadError {
    /// 失败所处阶段，用于事件上报
    pub fn stage(&self) -> &'static str {
        match self {
            UploadError::Transmission { .. } => "transmission",
            UploadError::Finalize(_) => "finalize",
            UploadError::Source(_) => "source",
            UploadError::Storage(_) => "storage",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_messages() {
        let err = ValidationError::UnsupportedType {
            name: "notes.txt".to_string(),
            mime_type: "text/plain".to_string(),
        };
        assert_eq!(err.to_string(), "文件 notes.txt 类型不支持");

        let err = ValidationError::TooLarge {
            name: "big.png".to_string(),
            size: 25 * 1024 * 1024,
            limit_mb: 20,
        };
        assert_eq!(err.to_string(), "文件 big.png 超过20MB限制");
        assert_eq!(err.file_name(), "big.png");
    }

    #[test]
    fn test_retriable_classification() {
        assert!(ApiError::Network("reset".into()).is_retriable());
        assert!(ApiError::Timeout.is_retriable());
        assert!(ApiError::from_status(reqwest::StatusCode::BAD_GATEWAY).is_retriable());
        assert!(ApiError::from_status(reqwest::StatusCode::TOO_MANY_REQUESTS).is_rate_limited());
        assert!(!ApiError::from_status(reqwest::StatusCode::NOT_FOUND).is_retriable());
        assert!(!ApiError::Rejected("合并失败".into()).is_retriable());
    }

    #[test]
    fn test_status_body_message_preferred() {
        let err = ApiError::from_status_body(
            reqwest::StatusCode::SERVICE_UNAVAILABLE,
            r#"{"success":false,"error":"磁盘空间不足"}"#,
        );
        assert_eq!(
            err,
            ApiError::Status {
                status: 503,
                message: "磁盘空间不足".into()
            }
        );
        assert!(err.is_retriable());
        assert_eq!(err.to_string(), "上传失败: 磁盘空间不足");

        let err = ApiError::from_status_body(
            reqwest::StatusCode::BAD_REQUEST,
            r#"{"message":"分片序号越界"}"#,
        );
        assert_eq!(err.to_string(), "上传失败: 分片序号越界");
        assert!(!err.is_retriable());

        // 非 JSON 或没有原因字段时退回状态码描述
        for body in ["<html>bad gateway</html>", "", r#"{"error":""}"#, r#"{"error":42}"#] {
            assert_eq!(
                ApiError::from_status_body(reqwest::StatusCode::BAD_GATEWAY, body),
                ApiError::from_status(reqwest::StatusCode::BAD_GATEWAY)
            );
        }
    }

    #[test]
    fn test_upload_error_preserves_reason() {
        let err = UploadError::Transmission {
            chunk_index: 1,
            source: ApiError::from_status(reqwest::StatusCode::INTERNAL_SERVER_ERROR),
        };
        assert_eq!(err.to_string(), "上传失败: Internal Server Error");
        assert_eq!(err.stage(), "transmission");

        let err = UploadError::Finalize(ApiError::Rejected("分片缺失".into()));
        assert_eq!(err.to_string(), "分片缺失");
    }
}
