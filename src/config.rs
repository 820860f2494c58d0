//! 程序配置
//!
//! 加载顺序：默认值 → TOML 配置文件（可选）→ 环境变量覆盖

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::de::value::StrDeserializer;
use serde::de::{DeserializeOwned, IntoDeserializer};
use serde::Deserialize;

use crate::error::{AppError, AppResult, ConfigError};

/// 默认配置文件名（当前目录下存在时自动加载）
pub const DEFAULT_CONFIG_FILE: &str = "payslips.toml";

/// 输出方式
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputMode {
    /// 所有 PDF 打包成一个 zip
    Archive,
    /// 每个 PDF 转换完成后立即单独保存
    PerFile,
}

/// 保存位置
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Delivery {
    /// 写入本地输出目录
    Filesystem,
    /// 通过浏览器自身的下载功能保存
    BrowserDownload,
}

/// 文件名重复时的处理方式
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// 追加序号：`label (2).pdf`
    Disambiguate,
    /// 直接报错，不产生任何流量
    Fail,
}

/// 下载 HTML 的方式
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchBackend {
    /// 在页面里调用 fetch，自动带上会话 Cookie
    Page,
    /// 用 reqwest 发请求，Cookie 从页面导出
    Http,
}

/// 跨页面状态保存位置
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateBackend {
    /// 门户页面的 localStorage
    LocalStorage,
    /// 本地 JSON 文件
    File,
}

/// 程序配置
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    // --- 浏览器 ---
    /// 浏览器调试端口
    pub browser_debug_port: u16,
    /// 用于找到门户标签页的 URL 片段
    pub portal_url_hint: String,

    // --- 门户地址 ---
    pub portal_base_url: String,
    /// 工资单历史页面路径
    pub history_path: String,
    /// URL 中包含该片段即认为已在历史页面
    pub history_url_marker: String,

    // --- 页面结构 ---
    pub details_menu_id: String,
    pub identity_cell_selector: String,
    pub listing_row_selector: String,
    /// 表格开头需要丢弃的行数（列标题 + "Year to Date" 汇总行）
    pub table_header_row_count: usize,
    /// 期末日期列的标题
    pub period_end_column_label: String,
    /// 找不到标题时使用的列位置（从 0 开始）
    pub period_end_column_index: usize,

    // --- 等待 ---
    pub poll_interval_ms: u64,
    pub readiness_timeout_secs: u64,

    // --- 批量转换 ---
    /// 同时转换的文档数量
    pub max_simultaneous_downloads: usize,
    pub batch_delay_ms: u64,
    pub fetch_timeout_secs: u64,
    pub render_timeout_secs: u64,
    /// 只打印要下载的文件，不发请求不渲染
    pub dry_run: bool,
    pub fetch_backend: FetchBackend,

    // --- 渲染参数 ---
    pub print_emulation: bool,
    pub render_dpi: u32,
    pub render_scale: f64,

    // --- 输出 ---
    pub output_mode: OutputMode,
    pub delivery: Delivery,
    pub duplicate_policy: DuplicatePolicy,
    pub output_dir: PathBuf,
    pub archive_name: String,

    // --- 跨页面状态 ---
    pub state_backend: StateBackend,
    pub state_key: String,
    pub state_file: PathBuf,
    /// 超过该时长的状态视为过期
    pub state_ttl_secs: u64,
    /// 单次运行最多经历的页面加载次数
    pub max_page_loads: usize,

    // --- 日志 ---
    pub verbose_logging: bool,
    pub output_log_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            browser_debug_port: 9222,
            portal_url_hint: "payroll.ascenderpay.com".to_string(),
            portal_base_url: "https://payroll.ascenderpay.com".to_string(),
            history_path: "ords/wss_vzbp/WK8020VZ$.startup".to_string(),
            history_url_marker: "ords/wss_vzbp".to_string(),
            details_menu_id: "pt1:pt_sdi8::btn".to_string(),
            identity_cell_selector: "div[id='pt1:pt_pfl1'] td".to_string(),
            listing_row_selector: "table[summary='Pehistpay'] tr".to_string(),
            table_header_row_count: 2,
            period_end_column_label: "Period End".to_string(),
            period_end_column_index: 5,
            poll_interval_ms: 500,
            readiness_timeout_secs: 60,
            max_simultaneous_downloads: 5,
            batch_delay_ms: 1000,
            fetch_timeout_secs: 30,
            render_timeout_secs: 60,
            dry_run: true,
            fetch_backend: FetchBackend::Page,
            print_emulation: true,
            render_dpi: 300,
            render_scale: 1.0,
            output_mode: OutputMode::Archive,
            delivery: Delivery::Filesystem,
            duplicate_policy: DuplicatePolicy::Disambiguate,
            output_dir: PathBuf::from("downloads"),
            archive_name: "payslips.zip".to_string(),
            state_backend: StateBackend::LocalStorage,
            state_key: "payslips.workflow".to_string(),
            state_file: PathBuf::from(".payslips-state.json"),
            state_ttl_secs: 15 * 60,
            max_page_loads: 4,
            verbose_logging: false,
            output_log_file: "payslips_run.txt".to_string(),
        }
    }
}

impl Config {
    /// 完整加载：配置文件 + 环境变量，并校验
    pub fn load() -> AppResult<Self> {
        let file = std::env::var("PAYSLIP_CONFIG")
            .ok()
            .map(PathBuf::from)
            .or_else(|| {
                let default = PathBuf::from(DEFAULT_CONFIG_FILE);
                default.exists().then_some(default)
            });

        let base = match file {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };

        let config = base.with_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// 从 TOML 文件读取，缺失的字段使用默认值
    pub fn from_file(path: &Path) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content).map_err(|e| match e {
            ConfigError::FileParseFailed { message, .. } => {
                AppError::from(ConfigError::FileParseFailed {
                    path: path.display().to_string(),
                    message,
                })
            }
            other => AppError::from(other),
        })
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::FileParseFailed {
            path: "<inline>".to_string(),
            message: e.to_string(),
        })
    }

    fn with_env_overrides(self) -> AppResult<Self> {
        self.with_overrides(|name| std::env::var(name).ok())
    }

    /// 按变量名逐项覆盖，`lookup` 返回 `None` 的保持原值
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> AppResult<Self> {
        let env = Overrides { lookup };
        env.parsed("BROWSER_DEBUG_PORT", &mut self.browser_debug_port)?;
        env.string("PORTAL_URL_HINT", &mut self.portal_url_hint);
        env.string("PORTAL_BASE_URL", &mut self.portal_base_url);
        env.parsed("TABLE_HEADER_ROW_COUNT", &mut self.table_header_row_count)?;
        env.string("PERIOD_END_COLUMN_LABEL", &mut self.period_end_column_label);
        env.parsed("PERIOD_END_COLUMN_INDEX", &mut self.period_end_column_index)?;
        env.parsed("POLL_INTERVAL_MS", &mut self.poll_interval_ms)?;
        env.parsed("READINESS_TIMEOUT_SECS", &mut self.readiness_timeout_secs)?;
        env.parsed("MAX_SIMULTANEOUS_DOWNLOADS", &mut self.max_simultaneous_downloads)?;
        env.parsed("BATCH_DELAY_MS", &mut self.batch_delay_ms)?;
        env.parsed("FETCH_TIMEOUT_SECS", &mut self.fetch_timeout_secs)?;
        env.parsed("RENDER_TIMEOUT_SECS", &mut self.render_timeout_secs)?;
        env.parsed("DRY_RUN", &mut self.dry_run)?;
        env.choice("FETCH_BACKEND", &mut self.fetch_backend)?;
        env.parsed("PRINT_EMULATION", &mut self.print_emulation)?;
        env.parsed("RENDER_DPI", &mut self.render_dpi)?;
        env.parsed("RENDER_SCALE", &mut self.render_scale)?;
        env.choice("OUTPUT_MODE", &mut self.output_mode)?;
        env.choice("DELIVERY", &mut self.delivery)?;
        env.choice("DUPLICATE_POLICY", &mut self.duplicate_policy)?;
        env.parsed("OUTPUT_DIR", &mut self.output_dir)?;
        env.string("ARCHIVE_NAME", &mut self.archive_name);
        env.choice("STATE_BACKEND", &mut self.state_backend)?;
        env.string("STATE_KEY", &mut self.state_key);
        env.parsed("STATE_FILE", &mut self.state_file)?;
        env.parsed("STATE_TTL_SECS", &mut self.state_ttl_secs)?;
        env.parsed("MAX_PAGE_LOADS", &mut self.max_page_loads)?;
        env.parsed("VERBOSE_LOGGING", &mut self.verbose_logging)?;
        env.string("OUTPUT_LOG_FILE", &mut self.output_log_file);
        Ok(self)
    }

    /// 校验配置，0 值会导致死循环或除零
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("poll_interval_ms", self.poll_interval_ms),
            ("readiness_timeout_secs", self.readiness_timeout_secs),
            (
                "max_simultaneous_downloads",
                self.max_simultaneous_downloads as u64,
            ),
            ("max_page_loads", self.max_page_loads as u64),
            ("render_dpi", u64::from(self.render_dpi)),
        ];
        for (key, value) in positive {
            if value == 0 {
                return Err(ConfigError::Invalid {
                    key: key.to_string(),
                    reason: "必须大于 0".to_string(),
                });
            }
        }
        if !(self.render_scale.is_finite() && self.render_scale > 0.0) {
            return Err(ConfigError::Invalid {
                key: "render_scale".to_string(),
                reason: format!("{} 不是正数", self.render_scale),
            });
        }
        if url::Url::parse(&self.portal_base_url).is_err() {
            return Err(ConfigError::Invalid {
                key: "portal_base_url".to_string(),
                reason: format!("'{}' 不是合法的 URL", self.portal_base_url),
            });
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn readiness_timeout(&self) -> Duration {
        Duration::from_secs(self.readiness_timeout_secs)
    }

    pub fn batch_delay(&self) -> Duration {
        Duration::from_millis(self.batch_delay_ms)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn render_timeout(&self) -> Duration {
        Duration::from_secs(self.render_timeout_secs)
    }

    pub fn state_ttl(&self) -> Duration {
        Duration::from_secs(self.state_ttl_secs)
    }
}

struct Overrides<F> {
    lookup: F,
}

impl<F: Fn(&str) -> Option<String>> Overrides<F> {
    fn string(&self, var_name: &str, target: &mut String) {
        if let Some(value) = (self.lookup)(var_name) {
            *target = value;
        }
    }

    fn parsed<T: FromStr>(&self, var_name: &str, target: &mut T) -> Result<(), ConfigError> {
        if let Some(value) = (self.lookup)(var_name) {
            *target = value.parse().map_err(|_| parse_failed::<T>(var_name, &value))?;
        }
        Ok(())
    }

    /// 枚举项，取值与配置文件相同（`per_file`、`browser_download` ……）
    fn choice<T: DeserializeOwned>(&self, var_name: &str, target: &mut T) -> Result<(), ConfigError> {
        if let Some(value) = (self.lookup)(var_name) {
            let deserializer: StrDeserializer<'_, serde::de::value::Error> =
                value.trim().into_deserializer();
            *target = T::deserialize(deserializer).map_err(|_| parse_failed::<T>(var_name, &value))?;
        }
        Ok(())
    }
}

fn parse_failed<T>(var_name: &str, value: &str) -> ConfigError {
    ConfigError::EnvVarParseFailed {
        var_name: var_name.to_string(),
        value: value.to_string(),
        expected_type: std::any::type_name::<T>().to_string(),
    }
}
