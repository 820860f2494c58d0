//! 门户页面能力
//!
//! 把"读 URL、点按钮、读表格、跳转"这些 DOM 操作收拢成一个 trait，
//! 工作流只依赖这个 trait，不直接拼 JS。

use async_trait::async_trait;
use serde::Deserialize;
use url::Url;

use crate::error::{AppResult, BrowserError};
use crate::infrastructure::JsExecutor;
use crate::models::TableRow;

#[async_trait]
pub trait PortalPage: Send + Sync {
    /// 当前地址
    async fn current_url(&self) -> AppResult<String>;

    /// 指定 id 的元素是否存在
    async fn element_exists(&self, id: &str) -> AppResult<bool>;

    /// 点击指定 id 的元素
    async fn click_element(&self, id: &str) -> AppResult<()>;

    /// 所有匹配选择器的元素的可见文字（已 trim）
    async fn element_texts(&self, selector: &str) -> AppResult<Vec<String>>;

    /// 所有匹配选择器的表格行快照
    async fn table_rows(&self, selector: &str) -> AppResult<Vec<TableRow>>;

    /// 整页跳转
    async fn redirect(&self, url: &Url) -> AppResult<()>;

    /// 等待当前导航结束
    async fn wait_for_navigation(&self) -> AppResult<()>;
}

#[derive(Debug, Deserialize)]
struct ClickOutcome {
    clicked: bool,
}

#[async_trait]
impl PortalPage for JsExecutor {
    async fn current_url(&self) -> AppResult<String> {
        self.eval_as("window.location.href").await
    }

    async fn element_exists(&self, id: &str) -> AppResult<bool> {
        let js_code = format!("document.getElementById({}) !== null", serde_json::to_string(id)?);
        self.eval_as(js_code).await
    }

    async fn click_element(&self, id: &str) -> AppResult<()> {
        let js_code = format!(
            r#"
            (() => {{
                const el = document.getElementById({});
                if (el === null) {{
                    return {{ clicked: false }};
                }}
                el.click();
                return {{ clicked: true }};
            }})()
            "#,
            serde_json::to_string(id)?
        );
        let outcome: ClickOutcome = self.eval_as(js_code).await?;
        if !outcome.clicked {
            return Err(BrowserError::ScriptRejected(format!("元素 #{} 不存在，无法点击", id)).into());
        }
        Ok(())
    }

    async fn element_texts(&self, selector: &str) -> AppResult<Vec<String>> {
        let js_code = format!(
            "[...document.querySelectorAll({})].map(el => (el.innerText || '').trim())",
            serde_json::to_string(selector)?
        );
        self.eval_as(js_code).await
    }

    async fn table_rows(&self, selector: &str) -> AppResult<Vec<TableRow>> {
        // 只取元素子节点，href 用浏览器解析后的绝对地址
        let js_code = format!(
            r#"
            [...document.querySelectorAll({})].map(row => ({{
                cells: [...row.children].map(cell => ({{
                    text: (cell.innerText || '').trim(),
                    links: [...cell.querySelectorAll('a')].map(a => ({{
                        href: a.href,
                        text: (a.innerText || '').trim()
                    }}))
                }}))
            }}))
            "#,
            serde_json::to_string(selector)?
        );
        self.eval_as(js_code).await
    }

    async fn redirect(&self, url: &Url) -> AppResult<()> {
        let js_code = format!(
            "(() => {{ window.location.href = {}; return true; }})()",
            serde_json::to_string(url.as_str())?
        );
        self.eval(js_code).await?;
        Ok(())
    }

    async fn wait_for_navigation(&self) -> AppResult<()> {
        self.page().wait_for_navigation().await?;
        Ok(())
    }
}
