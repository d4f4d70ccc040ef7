//! 图片尺寸探测与缩略图生成
//!
//! 均为阻塞操作，调用方需放到 `spawn_blocking` 中执行

use anyhow::{Context, Result};
use image::codecs::jpeg::JpegEncoder;
use image::DynamicImage;
use std::fs::File;
use std::io::{BufWriter, Cursor, Write};
use std::path::Path;

/// 缩略图 JPEG 质量
pub const THUMBNAIL_QUALITY: u8 = 70;

/// 图片数据来源
#[derive(Debug, Clone, Copy)]
pub enum ImageInput<'a> {
    Path(&'a Path),
    Bytes(&'a [u8]),
}

/// 读取图片宽高（只解析文件头）
pub fn probe_dimensions(input: ImageInput<'_>) -> Result<(u32, u32)> {
    match input {
        ImageInput::Path(path) => image::image_dimensions(path)
            .with_context(|| format!("读取图片尺寸失败: {:?}", path)),
        ImageInput::Bytes(bytes) => image::io::Reader::new(Cursor::new(bytes))
            .with_guessed_format()
            .context("识别图片格式失败")?
            .into_dimensions()
            .context("读取图片尺寸失败"),
    }
}

fn decode(input: ImageInput<'_>) -> Result<DynamicImage> {
    match input {
        ImageInput::Path(path) => {
            image::open(path).with_context(|| format!("解码图片失败: {:?}", path))
        }
        ImageInput::Bytes(bytes) => image::load_from_memory(bytes).context("解码图片失败"),
    }
}

/// 生成 JPEG 缩略图
///
/// 等比缩放到 max_edge × max_edge 以内，返回缩略图尺寸
pub fn generate_thumbnail(input: ImageInput<'_>, dest: &Path, max_edge: u32) -> Result<(u32, u32)> {
    let img = decode(input)?;
    let thumb = img.thumbnail(max_edge, max_edge).to_rgb8();

    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("创建缩略图目录失败: {:?}", parent))?;
    }

    let file = File::create(dest).with_context(|| format!("创建缩略图文件失败: {:?}", dest))?;
    let mut writer = BufWriter::new(file);
    JpegEncoder::new_with_quality(&mut writer, THUMBNAIL_QUALITY)
        .encode_image(&thumb)
        .context("编码缩略图失败")?;
    writer.flush().context("写入缩略图失败")?;

    Ok(thumb.dimensions())
}
