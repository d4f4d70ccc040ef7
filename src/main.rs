use anyhow::Context;
use clap::{Parser, Subcommand};
use picbed_rust::{
    common::{format_size, markdown_link},
    config::LogConfig,
    events::{NotificationLevel, UploadEvent},
    gallery::{paginate, Gallery},
    logging,
    storage::{ImageStore, UploadRecorder},
    AppConfig, ImageHostClient, UploadManager,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(name = "picbed-rust", version, about = "分片上传图床客户端")]
struct Cli {
    /// 配置文件路径
    #[arg(short, long, default_value = "config/app.toml")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// 上传图片（目录会递归展开）
    Upload {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        /// 上传成功后输出 Markdown 链接
        #[arg(long)]
        markdown: bool,
    },
    /// 查看远端图库
    List {
        #[arg(short, long, default_value = "")]
        search: String,
        #[arg(short, long, default_value_t = 1)]
        page: usize,
    },
    /// 删除远端图片
    Delete { id: String },
    /// 查看本地上传记录
    History {
        #[arg(short, long, default_value = "")]
        search: String,
        #[arg(short, long, default_value_t = 1)]
        page: usize,
    },
    /// 删除一条本地上传记录
    Forget { id: i64 },
}

/// 加载日志配置
///
/// 尝试从配置文件加载，失败时返回默认配置
async fn load_log_config(config_path: &str) -> LogConfig {
    if let Ok(content) = tokio::fs::read_to_string(config_path).await {
        if let Ok(config) = toml::from_str::<toml::Value>(&content) {
            if let Some(log_table) = config.get("log") {
                if let Ok(log_config) = log_table.clone().try_into::<LogConfig>() {
                    return log_config;
                }
            }
        }
    }

    LogConfig::default()
}

fn print_event(event: &UploadEvent, markdown: bool) {
    if let UploadEvent::BatchProgress {
        overall_progress,
        finished_files,
        total_files,
        ..
    } = event
    {
        println!(
            "总体进度 {}% (完成 {}/{})",
            overall_progress, finished_files, total_files
        );
    }

    if let Some(notification) = event.notification() {
        let icon = match notification.level {
            NotificationLevel::Success => "✅",
            NotificationLevel::Warning => "⚠️",
            NotificationLevel::Error => "❌",
        };
        println!("{} {}", icon, notification.message);
    }

    if let UploadEvent::Completed { file, .. } = event {
        if markdown {
            println!("{}", markdown_link(&file.url));
        } else {
            println!("{}", file.url);
        }
    }
}

async fn run_upload(config: &AppConfig, paths: Vec<PathBuf>, markdown: bool) -> anyhow::Result<()> {
    let api = Arc::new(ImageHostClient::new(&config.api)?);
    let recorder = UploadRecorder::from_config(&config.storage).context("打开本地图片库失败")?;
    let manager = UploadManager::new(api, &config.upload, recorder);

    let mut events = manager.subscribe();
    let receipt = manager.submit_paths(&paths)?;

    loop {
        tokio::select! {
            Some(event) = events.recv() => print_event(&event, markdown),
            _ = manager.wait_idle() => break,
        }
    }
    while let Ok(event) = events.try_recv() {
        print_event(&event, markdown);
    }

    let tasks = manager.tasks();
    let failed = tasks.iter().filter(|t| t.error.is_some()).count();
    manager.clear_finished();
    info!(
        "上传结束: 批次={}, 成功={}, 失败={}, 拒绝={}",
        receipt.batch_id,
        tasks.len() - failed,
        failed,
        receipt.rejected.len()
    );

    if failed > 0 || !receipt.rejected.is_empty() {
        anyhow::bail!(
            "{} 个文件上传失败，{} 个文件被拒绝",
            failed,
            receipt.rejected.len()
        );
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // 🔥 先尝试加载日志配置，失败时使用默认配置
    let log_config = load_log_config(&cli.config).await;

    // 🔥 初始化日志系统（必须保持 _log_guard 存活）
    let _log_guard = logging::init_logging(&log_config);

    info!("picbed-rust v{} 启动中...", env!("CARGO_PKG_VERSION"));

    let config = AppConfig::load_or_default(&cli.config).await;

    match cli.command {
        Command::Upload { paths, markdown } => run_upload(&config, paths, markdown).await?,
        Command::List { search, page } => {
            let api = Arc::new(ImageHostClient::new(&config.api)?);
            let gallery = Gallery::new(api, config.gallery.page_size);
            let page = gallery.fetch_page(&search, page).await?;

            for file in &page.items {
                println!(
                    "{}\t{}\t{}\t{}\t{}",
                    file.id,
                    file.name,
                    format_size(file.size),
                    file.upload_time,
                    file.url
                );
            }
            println!(
                "第 {}/{} 页，共 {} 个文件",
                page.page, page.total_pages, page.total_items
            );
        }
        Command::Delete { id } => {
            let api = Arc::new(ImageHostClient::new(&config.api)?);
            Gallery::new(api, config.gallery.page_size)
                .delete(&id)
                .await?;
            println!("已删除: {}", id);
        }
        Command::History { search, page } => {
            let store = ImageStore::open(&config.storage.db_path)?;
            let records = store.search(&search)?;
            let page = paginate(records, page, config.gallery.page_size);

            for record in &page.items {
                let dimensions = match (record.width, record.height) {
                    (Some(w), Some(h)) => format!("{}x{}", w, h),
                    _ => "-".to_string(),
                };
                println!(
                    "{}\t{}\t{}\t{}\t{}\t{}",
                    record.id,
                    record.name,
                    format_size(record.size),
                    dimensions,
                    record.upload_date,
                    record.url
                );
            }
            println!(
                "第 {}/{} 页，共 {} 条记录",
                page.page, page.total_pages, page.total_items
            );
        }
        Command::Forget { id } => {
            let store = ImageStore::open(&config.storage.db_path)?;
            if store.delete(id)? {
                println!("已删除记录: {}", id);
            } else {
                println!("记录不存在: {}", id);
            }
        }
    }

    Ok(())
}
