use std::fmt;

use url::Url;

/// 一份待下载的工资单
///
/// 从历史列表中提取一次，之后不再修改。`label` 同时作为输出文件名。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentDescriptor {
    /// 工资单 HTML 页面地址
    pub source_url: Url,
    /// 链接文字（期末日期）
    pub label: String,
}

impl DocumentDescriptor {
    pub fn new(source_url: Url, label: impl Into<String>) -> Self {
        Self {
            source_url,
            label: label.into(),
        }
    }
}

impl fmt::Display for DocumentDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[工资单 {}]", self.label)
    }
}
