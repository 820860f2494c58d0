//! 文件保存 - 业务能力层
//!
//! 两种保存目标，都保证临时资源在任何退出路径上被释放：
//! - `FileSystemSaver`：先写临时文件再改名，失败时临时文件随 drop 删除
//! - `BrowserDownloadSaver`：页面内创建 Blob URL 并触发下载，finally 中回收

use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use base64::Engine;
use serde::Deserialize;
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::error::{AppError, AppResult, BrowserError};
use crate::infrastructure::JsExecutor;

#[async_trait]
pub trait SaveTarget: Send + Sync {
    /// 保存一个文件，返回保存位置的描述
    async fn save(&self, filename: &str, bytes: &[u8]) -> AppResult<String>;
}

/// 写入本地目录
pub struct FileSystemSaver {
    dir: PathBuf,
}

impl FileSystemSaver {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl SaveTarget for FileSystemSaver {
    async fn save(&self, filename: &str, bytes: &[u8]) -> AppResult<String> {
        let dir = self.dir.clone();
        let filename = filename.to_string();
        let bytes = bytes.to_vec();

        let target = tokio::task::spawn_blocking(move || write_atomically(&dir, &filename, &bytes))
            .await
            .map_err(|e| AppError::State(format!("保存任务异常退出: {}", e)))??;

        info!("💾 已保存: {}", target.display());
        Ok(target.display().to_string())
    }
}

fn write_atomically(dir: &Path, filename: &str, bytes: &[u8]) -> AppResult<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let target = dir.join(filename);

    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.flush()?;
    tmp.as_file_mut().sync_all()?;
    tmp.persist(&target).map_err(|e| AppError::Io(e.error))?;
    Ok(target)
}

#[derive(Debug, Deserialize)]
struct DownloadReply {
    saved: bool,
    #[serde(default)]
    error: Option<String>,
}

/// 通过浏览器的下载功能保存
pub struct BrowserDownloadSaver {
    executor: JsExecutor,
}

impl BrowserDownloadSaver {
    pub fn new(executor: JsExecutor) -> Self {
        Self { executor }
    }
}

fn mime_type(filename: &str) -> &'static str {
    let lower = filename.to_ascii_lowercase();
    if lower.ends_with(".zip") {
        "application/zip"
    } else if lower.ends_with(".pdf") {
        "application/pdf"
    } else {
        "application/octet-stream"
    }
}

#[async_trait]
impl SaveTarget for BrowserDownloadSaver {
    async fn save(&self, filename: &str, bytes: &[u8]) -> AppResult<String> {
        let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
        debug!("通过浏览器下载 {} ({} 字节)", filename, bytes.len());

        let js_code = format!(
            r#"
            (() => {{
                let href = null;
                const anchor = document.createElement('a');
                try {{
                    const raw = atob({data});
                    const buffer = new Uint8Array(raw.length);
                    for (let i = 0; i < raw.length; i++) {{
                        buffer[i] = raw.charCodeAt(i);
                    }}
                    href = URL.createObjectURL(new Blob([buffer], {{ type: {mime} }}));
                    anchor.href = href;
                    anchor.download = {name};
                    anchor.style.display = 'none';
                    document.body.appendChild(anchor);
                    anchor.click();
                    return {{ saved: true }};
                }} catch (error) {{
                    return {{ saved: false, error: error.message }};
                }} finally {{
                    anchor.remove();
                    if (href !== null) {{
                        setTimeout(() => URL.revokeObjectURL(href), 0);
                    }}
                }}
            }})()
            "#,
            data = serde_json::to_string(&encoded)?,
            mime = serde_json::to_string(mime_type(filename))?,
            name = serde_json::to_string(filename)?,
        );

        let reply: DownloadReply = self.executor.eval_as(js_code).await?;
        if !reply.saved {
            return Err(BrowserError::ScriptRejected(format!(
                "浏览器下载 {} 失败: {}",
                filename,
                reply.error.unwrap_or_default()
            ))
            .into());
        }

        info!("💾 已交给浏览器下载: {}", filename);
        Ok(format!("浏览器下载: {}", filename))
    }
}
