//! 页面表格快照
//!
//! 由页面内的 JS 一次性序列化出来，Rust 侧只处理这些纯数据。

use serde::{Deserialize, Serialize};

/// 单元格中的链接
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableLink {
    /// 已解析为绝对地址的 href
    pub href: String,
    /// 可见文字
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableCell {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub links: Vec<TableLink>,
}

/// 一行（按页面渲染顺序）
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableRow {
    #[serde(default)]
    pub cells: Vec<TableCell>,
}

impl TableCell {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            links: Vec::new(),
        }
    }

    pub fn link(href: impl Into<String>, text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            text: text.clone(),
            links: vec![TableLink {
                href: href.into(),
                text,
            }],
        }
    }
}

impl TableRow {
    pub fn new(cells: Vec<TableCell>) -> Self {
        Self { cells }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_page_snapshot() {
        let json = r#"[
            {"cells": [{"text": "Period End"}, {"text": "Net"}]},
            {"cells": [{"text": "15/07/2024", "links": [{"href": "https://x/a", "text": "15/07/2024"}]}]},
            {}
        ]"#;
        let rows: Vec<TableRow> = serde_json::from_str(json).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].cells[0].text, "Period End");
        assert_eq!(rows[1].cells[0].links[0].href, "https://x/a");
        assert!(rows[2].cells.is_empty());
    }
}
