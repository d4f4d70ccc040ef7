//! 文件夹扫描
//!
//! 把命令行传入的目录展开为待上传文件列表

use crate::common::format_size;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::{DirEntry, WalkDir};

/// 文件扫描结果
#[derive(Debug, Clone)]
pub struct ScannedFile {
    /// 本地文件路径
    pub local_path: PathBuf,
    /// 相对于扫描根目录的路径
    pub relative_path: PathBuf,
    /// 文件大小（字节）
    pub size: u64,
}

/// 文件夹扫描配置
#[derive(Debug, Clone, Default)]
pub struct ScanOptions {
    /// 是否跟随符号链接
    pub follow_symlinks: bool,
    /// 最大文件数量，超过此数量将停止扫描
    pub max_files: Option<usize>,
    /// 跳过隐藏文件（以.开头的文件和文件夹）
    pub skip_hidden: bool,
}

/// 文件夹扫描器
#[derive(Debug, Clone, Default)]
pub struct FolderScanner {
    options: ScanOptions,
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map(|name| name.starts_with('.'))
        .unwrap_or(false)
}

impl FolderScanner {
    pub fn with_options(options: ScanOptions) -> Self {
        Self { options }
    }

    /// 递归扫描文件夹，结果按相对路径排序
    pub fn scan<P: AsRef<Path>>(&self, root_path: P) -> Result<Vec<ScannedFile>> {
        let root_path = root_path.as_ref();

        if !root_path.is_dir() {
            anyhow::bail!("扫描路径不是文件夹: {}", root_path.display());
        }

        info!("开始扫描文件夹: {}", root_path.display());

        let skip_hidden = self.options.skip_hidden;
        let walker = WalkDir::new(root_path)
            .follow_links(self.options.follow_symlinks)
            .into_iter()
            // 根目录本身不参与隐藏判断
            .filter_entry(|e| !(skip_hidden && e.depth() > 0 && is_hidden(e)));

        let mut files = Vec::new();
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("读取目录条目失败，已跳过: {}", e);
                    continue;
                }
            };

            if !entry.file_type().is_file() {
                continue;
            }

            let metadata = entry
                .metadata()
                .with_context(|| format!("读取文件元数据失败: {}", entry.path().display()))?;

            let relative_path = entry
                .path()
                .strip_prefix(root_path)
                .with_context(|| format!("计算相对路径失败: {}", entry.path().display()))?
                .to_path_buf();

            debug!(
                "扫描到文件: {} ({})",
                relative_path.display(),
                format_size(metadata.len())
            );

            files.push(ScannedFile {
                local_path: entry.path().to_path_buf(),
                relative_path,
                size: metadata.len(),
            });

            if let Some(max_files) = self.options.max_files {
                if files.len() >= max_files {
                    warn!("已达到最大文件数量限制 ({}), 停止扫描", max_files);
                    break;
                }
            }
        }

        files.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));

        info!(
            "文件夹扫描完成: {} 个文件，总大小 {}",
            files.len(),
            format_size(files.iter().map(|f| f.size).sum())
        );

        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn create_tree() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("2024").join("01")).unwrap();
        fs::create_dir_all(root.join(".cache")).unwrap();
        fs::write(root.join("a.png"), b"aa").unwrap();
        fs::write(root.join("2024").join("01").join("b.jpg"), b"bbbb").unwrap();
        fs::write(root.join(".hidden.png"), b"h").unwrap();
        fs::write(root.join(".cache").join("c.png"), b"c").unwrap();
        dir
    }

    #[test]
    fn test_scan_recursive_sorted() {
        let dir = create_tree();
        let files = FolderScanner::default().scan(dir.path()).unwrap();

        assert_eq!(files.len(), 4);
        let rel: Vec<_> = files.iter().map(|f| f.relative_path.clone()).collect();
        let mut sorted = rel.clone();
        sorted.sort();
        assert_eq!(rel, sorted);
    }

    #[test]
    fn test_skip_hidden() {
        let dir = create_tree();
        let scanner = FolderScanner::with_options(ScanOptions {
            skip_hidden: true,
            ..Default::default()
        });
        let files = scanner.scan(dir.path()).unwrap();

        let names: Vec<_> = files
            .iter()
            .map(|f| f.local_path.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["b.jpg", "a.png"]);
    }

    #[test]
    fn test_max_files() {
        let dir = create_tree();
        let scanner = FolderScanner::with_options(ScanOptions {
            max_files: Some(1),
            ..Default::default()
        });
        assert_eq!(scanner.scan(dir.path()).unwrap().len(), 1);
    }

    #[test]
    fn test_scan_file_path_is_error() {
        let dir = create_tree();
        assert!(FolderScanner::default().scan(dir.path().join("a.png")).is_err());
    }
}
