//! 本地图片记录 SQLite 数据库
//!
//! images 表：每条上传完成的图片一行

use std::path::Path;
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// 本地图片记录
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ImageRecord {
    pub id: i64,
    pub name: String,
    pub size: u64,
    /// 上传时间（本地时间 `YYYY-MM-DD HH:MM:SS`）
    pub upload_date: String,
    pub tags: Vec<String>,
    pub url: String,
    pub thumb_url: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

/// 待写入的图片记录
#[derive(Debug, Clone, Default)]
pub struct NewImage {
    pub name: String,
    pub size: u64,
    pub upload_date: String,
    pub tags: Vec<String>,
    pub url: String,
    pub thumb_url: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

const SELECT_COLUMNS: &str =
    "SELECT id, name, size, upload_date, tags, url, thumb_url, width, height FROM images";

/// 本地图片库
pub struct ImageStore {
    conn: Mutex<Connection>,
}

impl ImageStore {
    /// 打开（或创建）数据库文件
    pub fn open(db_path: &Path) -> Result<Self> {
        // 确保父目录存在
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(db_path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_tables()?;

        info!("本地图片库已打开: {:?}", db_path);
        Ok(store)
    }

    /// 内存数据库
    pub fn open_in_memory() -> Result<Self> {
        let store = Self {
            conn: Mutex::new(Connection::open_in_memory()?),
        };
        store.init_tables()?;
        Ok(store)
    }

    fn init_tables(&self) -> Result<()> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| anyhow!("获取数据库锁失败: {}", e))?;

        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS images (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                size INTEGER NOT NULL,
                upload_date TEXT NOT NULL,
                tags TEXT NOT NULL DEFAULT '',
                url TEXT NOT NULL,
                thumb_url TEXT,
                width INTEGER,
                height INTEGER
            )
            "#,
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_images_upload_date ON images(upload_date)",
            [],
        )?;

        Ok(())
    }

    fn map_row(row: &Row<'_>) -> rusqlite::Result<ImageRecord> {
        let tags: String = row.get(4)?;
        Ok(ImageRecord {
            id: row.get(0)?,
            name: row.get(1)?,
            size: row.get::<_, i64>(2)? as u64,
            upload_date: row.get(3)?,
            tags: split_tags(&tags),
            url: row.get(5)?,
            thumb_url: row.get(6)?,
            width: row.get(7)?,
            height: row.get(8)?,
        })
    }

    /// 写入记录，返回新记录 id
    pub fn add(&self, image: &NewImage) -> Result<i64> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| anyhow!("获取数据库锁失败: {}", e))?;

        conn.execute(
            "INSERT INTO images (name, size, upload_date, tags, url, thumb_url, width, height)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                image.name,
                image.size as i64,
                image.upload_date,
                image.tags.join(","),
                image.url,
                image.thumb_url,
                image.width,
                image.height,
            ],
        )?;

        let id = conn.last_insert_rowid();
        debug!("写入图片记录: id={}, name={}", id, image.name);
        Ok(id)
    }

    pub fn get(&self, id: i64) -> Result<Option<ImageRecord>> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| anyhow!("获取数据库锁失败: {}", e))?;

        let record = conn
            .query_row(
                &format!("{} WHERE id = ?1", SELECT_COLUMNS),
                params![id],
                Self::map_row,
            )
            .optional()?;
        Ok(record)
    }

    /// 全部记录，最新的在前
    pub fn list(&self) -> Result<Vec<ImageRecord>> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| anyhow!("获取数据库锁失败: {}", e))?;

        let mut stmt = conn.prepare(&format!(
            "{} ORDER BY upload_date DESC, id DESC",
            SELECT_COLUMNS
        ))?;
        let records = stmt
            .query_map([], Self::map_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }

    /// 按名称、上传时间、标签搜索（不区分大小写），空关键词返回全部
    pub fn search(&self, term: &str) -> Result<Vec<ImageRecord>> {
        let term = term.trim().to_lowercase();
        if term.is_empty() {
            return self.list();
        }

        let conn = self
            .conn
            .lock()
            .map_err(|e| anyhow!("获取数据库锁失败: {}", e))?;

        let mut stmt = conn.prepare(&format!(
            "{} WHERE instr(lower(name), ?1) > 0
                OR instr(lower(upload_date), ?1) > 0
                OR instr(lower(tags), ?1) > 0
             ORDER BY upload_date DESC, id DESC",
            SELECT_COLUMNS
        ))?;
        let records = stmt
            .query_map(params![term], Self::map_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }

    /// 删除记录，返回是否存在
    pub fn delete(&self, id: i64) -> Result<bool> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| anyhow!("获取数据库锁失败: {}", e))?;

        let affected = conn.execute("DELETE FROM images WHERE id = ?1", params![id])?;
        Ok(affected > 0)
    }

    pub fn count(&self) -> Result<usize> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| anyhow!("获取数据库锁失败: {}", e))?;

        let count: i64 = conn.query_row("SELECT COUNT(*) FROM images", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

fn split_tags(tags: &str) -> Vec<String> {
    tags.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(String::from)
        .collect()
}
