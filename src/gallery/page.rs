// 搜索与分页

use crate::api::RemoteFile;
use crate::storage::ImageRecord;
use serde::Serialize;

/// 可被关键词搜索的条目
pub trait Searchable {
    /// 参与匹配的文本字段
    fn search_fields(&self) -> Vec<&str>;
}

impl Searchable for RemoteFile {
    fn search_fields(&self) -> Vec<&str> {
        vec![self.name.as_str(), self.upload_time.as_str()]
    }
}

impl Searchable for ImageRecord {
    fn search_fields(&self) -> Vec<&str> {
        let mut fields = vec![self.name.as_str(), self.upload_date.as_str()];
        fields.extend(self.tags.iter().map(String::as_str));
        fields
    }
}

/// 按关键词过滤（去首尾空白、不区分大小写的子串匹配）
///
/// 空关键词返回全部
pub fn filter_by_term<T: Searchable>(items: Vec<T>, term: &str) -> Vec<T> {
    let term = term.trim().to_lowercase();
    if term.is_empty() {
        return items;
    }

    items
        .into_iter()
        .filter(|item| {
            item.search_fields()
                .iter()
                .any(|field| field.to_lowercase().contains(&term))
        })
        .collect()
}

/// 分页结果
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// 当前页（从 1 开始）
    pub page: usize,
    pub total_pages: usize,
    pub total_items: usize,
}

/// 分页，页码会被限制在 [1, total_pages]
///
/// 没有数据时 total_pages 为 0，返回空的第 1 页
pub fn paginate<T>(items: Vec<T>, page: usize, page_size: usize) -> Page<T> {
    let page_size = page_size.max(1);
    let total_items = items.len();
    let total_pages = total_items.div_ceil(page_size);
    let page = page.clamp(1, total_pages.max(1));

    let items = items
        .into_iter()
        .skip((page - 1) * page_size)
        .take(page_size)
        .collect();

    Page {
        items,
        page,
        total_pages,
        total_items,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, date: &str, tags: &[&str]) -> ImageRecord {
        ImageRecord {
            id: 0,
            name: name.to_string(),
            size: 1,
            upload_date: date.to_string(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            url: String::new(),
            thumb_url: None,
            width: None,
            height: None,
        }
    }

    #[test]
    fn test_filter_matches_name_date_and_tags() {
        let items = vec![
            record("Beach.png", "2024-07-01", &[]),
            record("mountain.jpg", "2023-01-01", &["Hiking"]),
            record("city.gif", "2024-02-02", &[]),
        ];

        assert_eq!(filter_by_term(items.clone(), "beach").len(), 1);
        assert_eq!(filter_by_term(items.clone(), " HIKING ").len(), 1);
        assert_eq!(filter_by_term(items.clone(), "2024").len(), 2);
        assert_eq!(filter_by_term(items.clone(), "   ").len(), 3);
        assert!(filter_by_term(items, "desert").is_empty());
    }

    #[test]
    fn test_paginate() {
        let items: Vec<usize> = (0..17).collect();

        let page = paginate(items.clone(), 1, 8);
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.items, (0..8).collect::<Vec<_>>());

        let last = paginate(items.clone(), 3, 8);
        assert_eq!(last.items, vec![16]);

        assert_eq!(paginate(items.clone(), 0, 8).page, 1);
        assert_eq!(paginate(items, 99, 8).page, 3);
    }

    #[test]
    fn test_paginate_empty() {
        let page = paginate(Vec::<usize>::new(), 5, 8);
        assert_eq!(page.page, 1);
        assert_eq!(page.total_pages, 0);
        assert!(page.items.is_empty());
    }
}
