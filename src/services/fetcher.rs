//! 工资单 HTML 下载 - 业务能力层
//!
//! 两种方式：
//! - `PageFetcher`：在门户页面里调用 fetch，浏览器自动带上会话 Cookie
//! - `HttpFetcher`：用 reqwest 直接请求，Cookie 从页面导出

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, COOKIE, USER_AGENT};
use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::error::{AppError, AppResult, BrowserError, ConversionError};
use crate::infrastructure::JsExecutor;

#[async_trait]
pub trait DocumentFetcher: Send + Sync {
    /// GET 指定地址，返回响应正文
    async fn fetch_html(&self, url: &Url) -> Result<String, ConversionError>;
}

/// 页面内 fetch 的返回值
#[derive(Debug, Deserialize)]
struct FetchReply {
    ok: bool,
    status: u16,
    #[serde(default)]
    body: String,
    #[serde(default)]
    error: Option<String>,
}

pub struct PageFetcher {
    executor: JsExecutor,
}

impl PageFetcher {
    pub fn new(executor: JsExecutor) -> Self {
        Self { executor }
    }
}

#[async_trait]
impl DocumentFetcher for PageFetcher {
    async fn fetch_html(&self, url: &Url) -> Result<String, ConversionError> {
        let fetch_error = |message: String| ConversionError::Fetch {
            url: url.to_string(),
            message,
        };

        let quoted = serde_json::to_string(url.as_str()).map_err(|e| fetch_error(e.to_string()))?;
        let js_code = format!(
            r#"
            (async () => {{
                try {{
                    const response = await fetch({}, {{ credentials: 'include' }});
                    const body = await response.text();
                    return {{ ok: response.ok, status: response.status, body }};
                }} catch (error) {{
                    return {{ ok: false, status: 0, error: error.message }};
                }}
            }})()
            "#,
            quoted
        );

        let reply: FetchReply = self
            .executor
            .eval_as(js_code)
            .await
            .map_err(|e| fetch_error(e.to_string()))?;
        debug!("页面内 fetch {} -> {}", url, reply.status);

        if let Some(message) = reply.error {
            return Err(fetch_error(message));
        }
        if !reply.ok {
            return Err(ConversionError::HttpStatus {
                url: url.to_string(),
                status: reply.status,
            });
        }
        Ok(reply.body)
    }
}

pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// 导出当前页面的 Cookie 和 User-Agent，构造一个等价会话的客户端
    pub async fn from_page(executor: &JsExecutor) -> AppResult<Self> {
        let cookies = executor.page().get_cookies().await?;
        let cookie_header = cookies
            .iter()
            .map(|c| format!("{}={}", c.name, c.value))
            .collect::<Vec<_>>()
            .join("; ");
        debug!("从页面导出 {} 个 Cookie", cookies.len());

        let user_agent: String = executor.eval_as("navigator.userAgent").await?;

        let mut headers = HeaderMap::new();
        if !cookie_header.is_empty() {
            headers.insert(COOKIE, header_value(&cookie_header)?);
        }
        headers.insert(USER_AGENT, header_value(&user_agent)?);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| BrowserError::ScriptRejected(format!("无法创建 HTTP 客户端: {}", e)))?;
        Ok(Self { client })
    }
}

fn header_value(value: &str) -> AppResult<HeaderValue> {
    HeaderValue::from_str(value).map_err(|e| {
        AppError::Browser(BrowserError::ScriptRejected(format!(
            "无法转换为请求头: {}",
            e
        )))
    })
}

#[async_trait]
impl DocumentFetcher for HttpFetcher {
    async fn fetch_html(&self, url: &Url) -> Result<String, ConversionError> {
        let fetch_error = |e: reqwest::Error| ConversionError::Fetch {
            url: url.to_string(),
            message: e.to_string(),
        };

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(fetch_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(ConversionError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        response.text().await.map_err(fetch_error)
    }
}
