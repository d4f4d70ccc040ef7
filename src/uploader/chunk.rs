// 上传分片管理
//
// 分片规则：
// - 分片大小固定（默认 5MB），最后一个分片为余数
// - 分片索引从 0 开始连续编号，覆盖整个文件且互不重叠
// - 空文件没有分片，准入阶段即被拒绝

use anyhow::{Context, Result};
use std::ops::Range;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::debug;

/// 默认上传分片大小: 5MB
pub const DEFAULT_CHUNK_SIZE: u64 = 5 * 1024 * 1024;

/// 计算分片数量 ceil(total_size / chunk_size)
pub fn chunk_count(total_size: u64, chunk_size: u64) -> usize {
    if chunk_size == 0 {
        return 0;
    }
    total_size.div_ceil(chunk_size) as usize
}

/// 按分片数计算进度百分比（四舍五入）
///
/// 线性按分片数计算，不按字节加权
pub fn chunk_progress(completed: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    let completed = completed.min(total) as u64;
    let total = total as u64;
    ((200 * completed + total) / (2 * total)) as u8
}

/// 分片描述
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkDescriptor {
    /// 分片索引
    pub index: usize,
    /// 字节范围 [start, end)
    pub range: Range<u64>,
    /// 所属文件的分片总数
    pub total: usize,
}

impl ChunkDescriptor {
    /// 分片大小
    pub fn size(&self) -> u64 {
        self.range.end - self.range.start
    }

    pub fn is_last(&self) -> bool {
        self.index + 1 == self.total
    }
}

/// 切分文件为分片
pub fn split_chunks(total_size: u64, chunk_size: u64) -> Vec<ChunkDescriptor> {
    let total = chunk_count(total_size, chunk_size);
    let mut chunks = Vec::with_capacity(total);
    let mut offset = 0u64;
    let mut index = 0;

    while offset < total_size {
        let end = std::cmp::min(offset + chunk_size, total_size);
        chunks.push(ChunkDescriptor {
            index,
            range: offset..end,
            total,
        });
        offset = end;
        index += 1;
    }

    chunks
}

/// 上传数据来源
#[derive(Debug, Clone)]
pub enum UploadSource {
    /// 本地文件
    File(PathBuf),
    /// 内存数据（粘贴板等）
    Memory(Arc<[u8]>),
}

impl UploadSource {
    /// 本地文件路径（内存数据返回 None）
    pub fn path(&self) -> Option<&PathBuf> {
        match self {
            UploadSource::File(path) => Some(path),
            UploadSource::Memory(_) => None,
        }
    }

    /// 读取分片数据
    pub async fn read_chunk(&self, chunk: &ChunkDescriptor) -> Result<Vec<u8>> {
        match self {
            UploadSource::File(path) => {
                let mut file = File::open(path)
                    .await
                    .with_context(|| format!("打开上传文件失败: {:?}", path))?;

                file.seek(std::io::SeekFrom::Start(chunk.range.start))
                    .await
                    .context("文件定位失败")?;

                let mut buffer = vec![0u8; chunk.size() as usize];
                file.read_exact(&mut buffer)
                    .await
                    .context("读取分片数据失败")?;

                debug!(
                    "读取分片 #{}: bytes={}-{}, 大小={} bytes",
                    chunk.index,
                    chunk.range.start,
                    chunk.range.end.saturating_sub(1),
                    buffer.len()
                );

                Ok(buffer)
            }
            UploadSource::Memory(data) => {
                let start = chunk.range.start as usize;
                let end = chunk.range.end as usize;
                data.get(start..end)
                    .map(|slice| slice.to_vec())
                    .with_context(|| {
                        format!("分片范围越界: {}..{} (数据长度 {})", start, end, data.len())
                    })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::io::Write;

    const MB: u64 = 1024 * 1024;

    #[test]
    fn test_split_12mb_file() {
        let chunks = split_chunks(12 * MB, 5 * MB);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].size(), 5 * MB);
        assert_eq!(chunks[1].size(), 5 * MB);
        assert_eq!(chunks[2].size(), 2 * MB);
        assert!(chunks[2].is_last());
        assert!(chunks.iter().all(|c| c.total == 3));
    }

    #[test]
    fn test_split_exact_multiple() {
        let chunks = split_chunks(10 * MB, 5 * MB);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1].range, 5 * MB..10 * MB);
    }

    #[test]
    fn test_empty_file_has_no_chunks() {
        assert!(split_chunks(0, 5 * MB).is_empty());
        assert_eq!(chunk_count(0, 5 * MB), 0);
    }

    #[test]
    fn test_chunk_progress_rounding() {
        assert_eq!(chunk_progress(1, 3), 33);
        assert_eq!(chunk_progress(2, 3), 67);
        assert_eq!(chunk_progress(3, 3), 100);
        assert_eq!(chunk_progress(1, 8), 13);
        assert_eq!(chunk_progress(0, 0), 0);
    }

    #[tokio::test]
    async fn test_read_chunk_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let data: Vec<u8> = (0..=255u8).cycle().take(1000).collect();
        file.write_all(&data).unwrap();

        let source = UploadSource::File(file.path().to_path_buf());
        let chunks = split_chunks(1000, 300);
        let last = chunks.last().unwrap();
        let bytes = source.read_chunk(last).await.unwrap();
        assert_eq!(bytes, &data[900..1000]);
    }

    #[tokio::test]
    async fn test_read_chunk_from_memory() {
        let source = UploadSource::Memory(Arc::from(&b"hello world"[..]));
        let chunks = split_chunks(11, 4);
        assert_eq!(source.read_chunk(&chunks[1]).await.unwrap(), b"o wo");
        assert_eq!(source.read_chunk(&chunks[2]).await.unwrap(), b"rld");
    }

    proptest! {
        #[test]
        fn prop_chunks_cover_range_exactly(size in 1u64..50_000_000, chunk in 1u64..8_000_000) {
            let chunks = split_chunks(size, chunk);
            prop_assert_eq!(chunks.len() as u64, (size + chunk - 1) / chunk);

            let mut expected_start = 0u64;
            for (i, c) in chunks.iter().enumerate() {
                prop_assert_eq!(c.index, i);
                prop_assert_eq!(c.range.start, expected_start);
                if c.is_last() {
                    prop_assert_eq!(c.size(), size - (chunks.len() as u64 - 1) * chunk);
                } else {
                    prop_assert_eq!(c.size(), chunk);
                }
                expected_start = c.range.end;
            }
            prop_assert_eq!(expected_start, size);
        }

        #[test]
        fn prop_progress_monotonic(total in 1usize..500) {
            let mut last = 0u8;
            for done in 0..=total {
                let p = chunk_progress(done, total);
                prop_assert!(p >= last);
                prop_assert!(p <= 100);
                last = p;
            }
            prop_assert_eq!(last, 100);
        }
    }
}
