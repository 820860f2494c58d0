use std::time::Duration;

use thiserror::Error;

/// 应用程序错误类型
///
/// `RowExtraction` / `Conversion` 只在行、文档级别出现，记录后跳过；
/// 其余变体会终止整个流程。
#[derive(Debug, Error)]
pub enum AppError {
    /// 浏览器相关错误
    #[error("浏览器错误: {0}")]
    Browser(#[from] BrowserError),

    /// 等待的页面元素始终没有出现
    #[error("等待页面元素超时: {target} (已等待 {waited:?})")]
    ReadinessTimeout { target: String, waited: Duration },

    /// 操作被取消（Ctrl-C 或页面离开）
    #[error("操作已取消")]
    Cancelled,

    /// 无法完成导航（例如员工信息格式不对）
    #[error("导航前置条件不满足: {0}")]
    NavigationPrecondition(String),

    /// 表格行缺少预期的列或链接
    #[error("表格行解析失败: {0}")]
    RowExtraction(#[from] RowExtractionError),

    /// 单个文档的下载或渲染失败
    #[error("文档转换失败: {0}")]
    Conversion(#[from] ConversionError),

    /// 打包或保存归档失败
    #[error("归档失败: {0}")]
    ArchiveAssembly(String),

    /// 跨页面状态读写失败
    #[error("状态存储错误: {0}")]
    State(String),

    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),

    /// JSON 解析失败
    #[error("JSON解析失败: {0}")]
    Json(#[from] serde_json::Error),

    /// 文件操作错误
    #[error("文件错误: {0}")]
    Io(#[from] std::io::Error),
}

/// 浏览器相关错误
#[derive(Debug, Error)]
pub enum BrowserError {
    /// 连接浏览器失败
    #[error("无法连接到浏览器 ({endpoint}): {source}")]
    ConnectionFailed {
        endpoint: String,
        #[source]
        source: chromiumoxide::error::CdpError,
    },
    /// 找不到门户页面
    #[error("没有找到匹配 '{hint}' 的页面")]
    PageNotFound { hint: String },
    /// 执行脚本失败
    #[error("执行脚本失败: {0}")]
    ScriptFailed(#[from] chromiumoxide::error::CdpError),
    /// 脚本执行成功，但页面内返回了错误
    #[error("页面脚本返回错误: {0}")]
    ScriptRejected(String),
}

/// 单行解析错误（行号从 1 开始，按表格中原始位置计算）
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RowExtractionError {
    #[error("第 {row} 行缺少列 {column}")]
    MissingColumn { row: usize, column: String },
    #[error("第 {row} 行的目标列中没有链接")]
    MissingLink { row: usize },
    #[error("第 {row} 行的链接文字为空")]
    EmptyLabel { row: usize },
    #[error("第 {row} 行的链接地址无效: {href}")]
    InvalidUrl { row: usize, href: String },
}

/// 单个文档的转换错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConversionError {
    #[error("下载 {url} 失败: {message}")]
    Fetch { url: String, message: String },
    #[error("下载 {url} 返回状态码 {status}")]
    HttpStatus { url: String, status: u16 },
    #[error("{url} 返回了空文档")]
    EmptyDocument { url: String },
    #[error("渲染 {label} 失败: {message}")]
    Render { label: String, message: String },
    #[error("{stage} 超时 ({after:?})")]
    Timeout { stage: &'static str, after: Duration },
    #[error("保存 {filename} 失败: {message}")]
    Save { filename: String, message: String },
    #[error("转换已取消")]
    Cancelled,
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 环境变量解析失败
    #[error("环境变量 {var_name} 解析失败: 值 '{value}' 无法转换为 {expected_type}")]
    EnvVarParseFailed {
        var_name: String,
        value: String,
        expected_type: String,
    },
    /// 配置文件解析失败
    #[error("配置文件 {path} 解析失败: {message}")]
    FileParseFailed { path: String, message: String },
    /// 配置值不合法
    #[error("配置项 {key} 不合法: {reason}")]
    Invalid { key: String, reason: String },
}

// ========== 从常见错误类型转换 ==========

impl From<chromiumoxide::error::CdpError> for AppError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        AppError::Browser(BrowserError::ScriptFailed(err))
    }
}

impl From<zip::result::ZipError> for AppError {
    fn from(err: zip::result::ZipError) -> Self {
        AppError::ArchiveAssembly(err.to_string())
    }
}

// ========== 便捷构造函数 ==========

impl AppError {
    /// 创建浏览器连接错误
    pub fn browser_connection_failed(
        endpoint: impl Into<String>,
        source: chromiumoxide::error::CdpError,
    ) -> Self {
        AppError::Browser(BrowserError::ConnectionFailed {
            endpoint: endpoint.into(),
            source,
        })
    }

    /// 创建超时错误
    pub fn readiness_timeout(target: impl Into<String>, waited: Duration) -> Self {
        AppError::ReadinessTimeout {
            target: target.into(),
            waited,
        }
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;
