//! PDF 渲染 - 业务能力层
//!
//! 下载到的 HTML 先解析成独立的文档片段，再交给浏览器新开的标签页渲染成 PDF。

use std::sync::Arc;

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::emulation::{
    SetDeviceMetricsOverrideParams, SetEmulatedMediaParams,
};
use chromiumoxide::cdp::browser_protocol::page::PrintToPdfParams;
use chromiumoxide::{Browser, Page};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;
use url::Url;

use crate::config::Config;
use crate::error::{AppResult, ConversionError};

/// 与页面 CSS 像素对应的 DPI
const CSS_DPI: f64 = 96.0;

static BASE_TAG: Lazy<Result<Regex, regex::Error>> = Lazy::new(|| Regex::new(r"(?i)<base\s"));
static HEAD_TAG: Lazy<Result<Regex, regex::Error>> = Lazy::new(|| Regex::new(r"(?i)<head(\s[^>]*)?>"));

/// A4 在 96 DPI 下的视口大小
const A4_VIEWPORT: (i64, i64) = (794, 1123);

/// 独立于门户页面的 HTML 文档
///
/// 插入 `<base href>`，让相对地址的图片和样式按原页面地址解析
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentFragment {
    html: String,
}

impl DocumentFragment {
    pub fn parse(html: &str, base_url: &Url) -> Result<Self, ConversionError> {
        let trimmed = html.trim();
        if trimmed.is_empty() {
            return Err(ConversionError::EmptyDocument {
                url: base_url.to_string(),
            });
        }

        let parse_error = |e: &regex::Error| ConversionError::Render {
            label: base_url.to_string(),
            message: e.to_string(),
        };
        let has_base = BASE_TAG.as_ref().map_err(parse_error)?;
        if has_base.is_match(trimmed) {
            return Ok(Self {
                html: trimmed.to_string(),
            });
        }

        let base_tag = format!(r#"<base href="{}">"#, escape_attribute(base_url.as_str()));
        let head = HEAD_TAG.as_ref().map_err(parse_error)?;
        let html = match head.find(trimmed) {
            Some(m) => format!("{}{}{}", &trimmed[..m.end()], base_tag, &trimmed[m.end()..]),
            None => format!("<head>{}</head>{}", base_tag, trimmed),
        };
        Ok(Self { html })
    }

    pub fn html(&self) -> &str {
        &self.html
    }
}

fn escape_attribute(value: &str) -> String {
    value.replace('&', "&amp;").replace('"', "&quot;")
}

/// 渲染质量参数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderOptions {
    /// 使用打印样式表
    pub print_emulation: bool,
    /// 输出分辨率
    pub dpi: u32,
    /// 页面缩放
    pub scale: f64,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            print_emulation: true,
            dpi: 300,
            scale: 1.0,
        }
    }
}

impl RenderOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            print_emulation: config.print_emulation,
            dpi: config.render_dpi,
            scale: config.render_scale,
        }
    }

    /// 设备像素比，决定页面内位图的清晰度
    pub fn device_scale_factor(&self) -> f64 {
        (f64::from(self.dpi) / CSS_DPI).clamp(1.0, 4.0)
    }

    /// printToPDF 只接受 0.1 ~ 2.0
    pub fn pdf_scale(&self) -> f64 {
        self.scale.clamp(0.1, 2.0)
    }
}

#[async_trait]
pub trait PdfRenderer: Send + Sync {
    async fn render(&self, fragment: &DocumentFragment, label: &str) -> Result<Vec<u8>, ConversionError>;
}

/// 用浏览器新标签页渲染
pub struct ChromePdfRenderer {
    browser: Arc<Browser>,
    options: RenderOptions,
}

impl ChromePdfRenderer {
    pub fn new(browser: Arc<Browser>, options: RenderOptions) -> Self {
        Self { browser, options }
    }

    async fn render_on(&self, page: &Page, fragment: &DocumentFragment) -> AppResult<Vec<u8>> {
        if self.options.print_emulation {
            page.execute(SetEmulatedMediaParams::builder().media("print").build())
                .await?;
        }
        page.execute(SetDeviceMetricsOverrideParams::new(
            A4_VIEWPORT.0,
            A4_VIEWPORT.1,
            self.options.device_scale_factor(),
            false,
        ))
        .await?;

        page.set_content(fragment.html()).await?;

        let params = PrintToPdfParams::builder()
            .print_background(true)
            .prefer_css_page_size(true)
            .scale(self.options.pdf_scale())
            .build();
        Ok(page.pdf(params).await?)
    }
}

#[async_trait]
impl PdfRenderer for ChromePdfRenderer {
    async fn render(&self, fragment: &DocumentFragment, label: &str) -> Result<Vec<u8>, ConversionError> {
        let render_error = |message: String| ConversionError::Render {
            label: label.to_string(),
            message,
        };

        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| render_error(e.to_string()))?;

        let result = self.render_on(&page, fragment).await;

        // 无论成功与否都关闭渲染用的标签页
        if let Err(e) = page.close().await {
            debug!("关闭渲染标签页失败 ({}): {}", label, e);
        }

        let bytes = result.map_err(|e| render_error(e.to_string()))?;
        debug!("{} 渲染完成: {} 字节", label, bytes.len());
        Ok(bytes)
    }
}
