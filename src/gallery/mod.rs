//! 图库：列表、搜索、分页、删除

mod page;

pub use page::{filter_by_term, paginate, Page, Searchable};

use crate::api::{ImageHostApi, RemoteFile};
use crate::error::ApiError;
use std::sync::Arc;
use tracing::info;

/// 远端图库
#[derive(Clone)]
pub struct Gallery {
    api: Arc<dyn ImageHostApi>,
    page_size: usize,
}

impl Gallery {
    pub fn new(api: Arc<dyn ImageHostApi>, page_size: usize) -> Self {
        Self {
            api,
            page_size: page_size.max(1),
        }
    }

    /// 拉取文件列表并按关键词过滤、分页
    pub async fn fetch_page(&self, term: &str, page: usize) -> Result<Page<RemoteFile>, ApiError> {
        let files = self.api.list_files().await?;
        let matched = filter_by_term(files, term);
        Ok(paginate(matched, page, self.page_size))
    }

    /// 删除远端文件
    pub async fn delete(&self, id: &str) -> Result<(), ApiError> {
        self.api.delete_file(id).await?;
        info!("🗑️ 已删除远端文件: id={}", id);
        Ok(())
    }
}
