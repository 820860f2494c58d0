use chromiumoxide::{Browser, Page};
use futures::StreamExt;
use tokio::time::{sleep, Duration};
use tracing::{debug, error, info, warn};

use crate::error::{AppError, AppResult};

/// 连接到用户已打开的浏览器，并找到门户页面
///
/// 优先使用 URL 包含 `url_hint` 的已有页面（登录状态在那里）；
/// 找不到时新开一个标签页打开 `fallback_url`，让用户自行登录。
pub async fn connect_to_portal(
    port: u16,
    url_hint: &str,
    fallback_url: &str,
) -> AppResult<(Browser, Page)> {
    let browser_url = format!("http://localhost:{}", port);
    info!("🔌 正在连接到浏览器: {}", browser_url);

    let (browser, mut handler) = Browser::connect(&browser_url).await.map_err(|e| {
        error!("连接浏览器失败: {}", e);
        AppError::browser_connection_failed(&browser_url, e)
    })?;
    debug!("浏览器连接成功");

    // 在后台处理浏览器事件
    tokio::spawn(async move {
        while let Some(h) = handler.next().await {
            if h.is_err() {
                break;
            }
        }
    });

    // 等待浏览器同步已有的标签页
    sleep(Duration::from_millis(300)).await;

    let pages = browser.pages().await?;
    debug!("获取到 {} 个页面", pages.len());

    for page in pages {
        match page.url().await {
            Ok(Some(url)) if url.contains(url_hint) => {
                info!("✓ 找到门户页面: {}", url);
                return Ok((browser, page));
            }
            Ok(url) => debug!("跳过页面: {:?}", url),
            Err(e) => debug!("读取页面地址失败: {}", e),
        }
    }

    warn!("⚠️ 没有找到包含 '{}' 的页面，新开标签页: {}", url_hint, fallback_url);
    let page = browser.new_page(fallback_url).await.map_err(|e| {
        error!("打开 {} 失败: {}", fallback_url, e);
        e
    })?;
    Ok((browser, page))
}
