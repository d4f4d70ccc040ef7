// 上传完成后写入本地图片记录

use super::store::{ImageStore, NewImage};
use crate::config::StorageConfig;
use crate::error::UploadError;
use crate::imaging::{self, ImageInput};
use crate::uploader::{UploadSource, UploadTask};
use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// 上传记录器
///
/// 尺寸探测或缩略图失败只记日志，数据库写入失败才算记录失败
#[derive(Clone)]
pub struct UploadRecorder {
    store: Arc<ImageStore>,
    thumbnail_dir: Option<PathBuf>,
    thumbnail_max_edge: u32,
}

impl UploadRecorder {
    pub fn new(store: Arc<ImageStore>, thumbnail_dir: Option<PathBuf>, max_edge: u32) -> Self {
        Self {
            store,
            thumbnail_dir,
            thumbnail_max_edge: max_edge,
        }
    }

    /// 按配置打开数据库，未启用时返回 None
    pub fn from_config(config: &StorageConfig) -> Result<Option<Self>> {
        if !config.enabled {
            return Ok(None);
        }
        let store = Arc::new(ImageStore::open(&config.db_path)?);
        Ok(Some(Self::new(
            store,
            config.thumbnail_dir.clone(),
            config.thumbnail_max_edge,
        )))
    }

    /// 记录一个已完成的任务，返回记录 id
    pub async fn record(&self, task: &UploadTask, source: &UploadSource) -> Result<i64, UploadError> {
        let recorder = self.clone();
        let task = task.clone();
        let source = source.clone();

        tokio::task::spawn_blocking(move || recorder.record_blocking(&task, &source))
            .await
            .map_err(|e| UploadError::Storage(format!("记录任务异常退出: {}", e)))?
    }

    fn record_blocking(&self, task: &UploadTask, source: &UploadSource) -> Result<i64, UploadError> {
        let result = task.result.clone().unwrap_or_default();

        let input = match source {
            UploadSource::File(path) => ImageInput::Path(path),
            UploadSource::Memory(data) => ImageInput::Bytes(data),
        };

        let (width, height) = match imaging::probe_dimensions(input) {
            Ok((w, h)) => (Some(w), Some(h)),
            Err(e) => {
                // SVG 等矢量格式无法解析尺寸
                debug!("跳过尺寸探测: name={}, {:#}", task.name, e);
                (None, None)
            }
        };

        let local_thumb = self.thumbnail_dir.as_ref().and_then(|dir| {
            if width.is_none() {
                return None;
            }
            let dest = dir.join(format!("{}.jpg", task.id));
            match imaging::generate_thumbnail(input, &dest, self.thumbnail_max_edge) {
                Ok(_) => Some(dest.to_string_lossy().to_string()),
                Err(e) => {
                    warn!("生成缩略图失败: name={}, {:#}", task.name, e);
                    None
                }
            }
        });

        let image = NewImage {
            name: if result.name.is_empty() {
                task.name.clone()
            } else {
                result.name.clone()
            },
            size: task.size,
            upload_date: chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            tags: Vec::new(),
            url: result.url.clone(),
            thumb_url: result.thumbnail_url.clone().or(local_thumb),
            width,
            height,
        };

        let id = self
            .store
            .add(&image)
            .map_err(|e| UploadError::Storage(format!("{:#}", e)))?;

        info!("📝 已写入本地记录: id={}, name={}", id, image.name);
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::UploadedFile;
    use image::{DynamicImage, ImageFormat, RgbImage};
    use std::io::Cursor;

    fn png_bytes() -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(RgbImage::new(400, 300))
            .write_to(&mut buf, ImageFormat::Png)
            .unwrap();
        buf.into_inner()
    }

    fn completed_task(size: u64) -> UploadTask {
        let mut task = UploadTask::new(
            "b".into(),
            "shot.png".into(),
            "image/png".into(),
            size,
            1,
        );
        task.mark_uploading();
        task.mark_completed(UploadedFile {
            id: Some("9".into()),
            name: "shot.png".into(),
            size,
            url: "https://img.example.com/shot.png".into(),
            thumbnail_url: None,
        });
        task
    }

    #[tokio::test]
    async fn test_record_file_source_with_thumbnail() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("shot.png");
        let data = png_bytes();
        std::fs::write(&src, &data).unwrap();

        let store = Arc::new(ImageStore::open_in_memory().unwrap());
        let recorder = UploadRecorder::new(store.clone(), Some(dir.path().join("thumbs")), 200);

        let task = completed_task(data.len() as u64);
        let id = recorder
            .record(&task, &UploadSource::File(src))
            .await
            .unwrap();

        let record = store.get(id).unwrap().unwrap();
        assert_eq!(record.url, "https://img.example.com/shot.png");
        assert_eq!((record.width, record.height), (Some(400), Some(300)));
        let thumb = record.thumb_url.unwrap();
        assert_eq!(image::image_dimensions(&thumb).unwrap(), (200, 150));
    }

    #[tokio::test]
    async fn test_record_unparseable_image_without_dimensions() {
        let store = Arc::new(ImageStore::open_in_memory().unwrap());
        let recorder = UploadRecorder::new(store.clone(), None, 200);

        let task = completed_task(11);
        let source = UploadSource::Memory(Arc::from(&b"<svg></svg>"[..]));
        let id = recorder.record(&task, &source).await.unwrap();

        let record = store.get(id).unwrap().unwrap();
        assert_eq!(record.width, None);
        assert_eq!(record.thumb_url, None);
    }
}
