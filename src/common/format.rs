// 展示用格式化工具

const SIZE_UNITS: [&str; 5] = ["Bytes", "KB", "MB", "GB", "TB"];

/// 人类可读的文件大小
///
/// 1024 进制，最多保留两位小数并去掉末尾的 0，例如 `1.5 KB`、`2.25 MB`
pub fn format_size(bytes: u64) -> String {
    if bytes == 0 {
        return "0 Bytes".to_string();
    }

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < SIZE_UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    let text = format!("{:.2}", value);
    let text = text.trim_end_matches('0').trim_end_matches('.');
    format!("{} {}", text, SIZE_UNITS[unit])
}

/// Markdown 图片链接
pub fn markdown_link(url: &str) -> String {
    format!("![image]({})", url)
}
