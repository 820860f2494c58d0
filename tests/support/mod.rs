//! 测试用的假门户、假下载器、假渲染器和内存保存目标
#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use url::Url;

use payslip_harvest::config::Config;
use payslip_harvest::error::{AppError, AppResult, BrowserError, ConversionError};
use payslip_harvest::infrastructure::PortalPage;
use payslip_harvest::models::{TableCell, TableRow};
use payslip_harvest::services::{DocumentFetcher, DocumentFragment, PdfRenderer, SaveTarget};

pub const ENTRY_URL: &str = "https://payroll.ascenderpay.com/wss/faces/home";
pub const LISTING_URL: &str =
    "https://payroll.ascenderpay.com/ords/wss_vzbp/WK8020VZ$.startup?Z_EMPLOYEE_NUMBER=12345&P_MODE=R";

/// 测试配置：短间隔、无批次间隔
pub fn test_config() -> Config {
    Config {
        poll_interval_ms: 5,
        batch_delay_ms: 0,
        fetch_timeout_secs: 5,
        render_timeout_secs: 5,
        dry_run: false,
        ..Config::default()
    }
}

/// 历史列表：列标题行 + "Year to Date" 汇总行 + 每个 label 一行
pub fn listing_rows(labels: &[&str]) -> Vec<TableRow> {
    let mut rows = vec![
        TableRow::new(
            ["Pay Date", "Type", "Gross", "Tax", "Net", "Period End"]
                .into_iter()
                .map(TableCell::text)
                .collect(),
        ),
        TableRow::new(vec![TableCell::text("Year to Date")]),
    ];
    for (i, label) in labels.iter().enumerate() {
        let mut cells: Vec<TableCell> = (0..5).map(|c| TableCell::text(format!("{i}-{c}"))).collect();
        cells.push(TableCell::link(slip_url(i), *label));
        rows.push(TableRow::new(cells));
    }
    rows
}

pub fn slip_url(index: usize) -> String {
    format!("https://payroll.ascenderpay.com/ords/wss_vzbp/WK8040$.slip?id={index}")
}

// ========== 假门户 ==========

#[derive(Debug, Default)]
struct PortalState {
    url: String,
    menu_open: bool,
    redirects: Vec<Url>,
}

/// 模拟入口页（菜单 → 员工信息）和历史列表页
pub struct FakePortal {
    state: Mutex<PortalState>,
    identity_text: String,
    rows: Vec<TableRow>,
    marker: String,
    redirect_fails: bool,
    redirect_moves: bool,
}

impl FakePortal {
    pub fn at(url: &str, identity_text: &str, rows: Vec<TableRow>) -> Self {
        Self {
            state: Mutex::new(PortalState {
                url: url.to_string(),
                ..PortalState::default()
            }),
            identity_text: identity_text.to_string(),
            rows,
            marker: Config::default().history_url_marker,
            redirect_fails: false,
            redirect_moves: true,
        }
    }

    /// 跳转请求直接失败
    pub fn failing_redirect(mut self) -> Self {
        self.redirect_fails = true;
        self
    }

    /// 跳转请求成功，但页面一直不动
    pub fn stuck_redirect(mut self) -> Self {
        self.redirect_moves = false;
        self
    }

    pub fn redirects(&self) -> Vec<Url> {
        self.state.lock().unwrap().redirects.clone()
    }

    pub fn url(&self) -> String {
        self.state.lock().unwrap().url.clone()
    }

    fn on_listing(&self, url: &str) -> bool {
        url.contains(&self.marker)
    }
}

#[async_trait]
impl PortalPage for FakePortal {
    async fn current_url(&self) -> AppResult<String> {
        Ok(self.url())
    }

    async fn element_exists(&self, _id: &str) -> AppResult<bool> {
        Ok(!self.on_listing(&self.url()))
    }

    async fn click_element(&self, _id: &str) -> AppResult<()> {
        self.state.lock().unwrap().menu_open = true;
        Ok(())
    }

    async fn element_texts(&self, _selector: &str) -> AppResult<Vec<String>> {
        let open = self.state.lock().unwrap().menu_open;
        Ok(if open {
            vec![self.identity_text.clone(), "Payroll".to_string()]
        } else {
            Vec::new()
        })
    }

    async fn table_rows(&self, _selector: &str) -> AppResult<Vec<TableRow>> {
        Ok(if self.on_listing(&self.url()) {
            self.rows.clone()
        } else {
            Vec::new()
        })
    }

    async fn redirect(&self, url: &Url) -> AppResult<()> {
        if self.redirect_fails {
            return Err(AppError::Browser(BrowserError::ScriptRejected(
                "navigation blocked".to_string(),
            )));
        }
        let mut state = self.state.lock().unwrap();
        state.redirects.push(url.clone());
        if self.redirect_moves {
            state.url = url.to_string();
            state.menu_open = false;
        }
        Ok(())
    }

    async fn wait_for_navigation(&self) -> AppResult<()> {
        Ok(())
    }
}

// ========== 假下载 / 渲染 ==========

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Start(String),
    Finish(String),
}

/// 下载记录开始/结束事件，指定的地址返回错误
#[derive(Clone, Default)]
pub struct FakeFetcher {
    pub events: Arc<Mutex<Vec<Event>>>,
    failing: HashSet<String>,
    delay: Duration,
}

impl FakeFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn failing_on(mut self, url: impl Into<String>) -> Self {
        self.failing.insert(url.into());
        self
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, Event::Start(_)))
            .count()
    }
}

#[async_trait]
impl DocumentFetcher for FakeFetcher {
    async fn fetch_html(&self, url: &Url) -> Result<String, ConversionError> {
        self.events.lock().unwrap().push(Event::Start(url.to_string()));
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.events.lock().unwrap().push(Event::Finish(url.to_string()));

        if self.failing.contains(url.as_str()) {
            return Err(ConversionError::HttpStatus {
                url: url.to_string(),
                status: 500,
            });
        }
        Ok(format!("<html><head><title>slip</title></head><body>{url}</body></html>"))
    }
}

/// 把 label 写进"PDF"，指定的 label 渲染失败
#[derive(Default)]
pub struct FakeRenderer {
    failing: HashSet<String>,
}

impl FakeRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(mut self, label: impl Into<String>) -> Self {
        self.failing.insert(label.into());
        self
    }
}

#[async_trait]
impl PdfRenderer for FakeRenderer {
    async fn render(&self, fragment: &DocumentFragment, label: &str) -> Result<Vec<u8>, ConversionError> {
        if self.failing.contains(label) {
            return Err(ConversionError::Render {
                label: label.to_string(),
                message: "printToPDF failed".to_string(),
            });
        }
        assert!(fragment.html().contains("<base href="));
        Ok(format!("%PDF-1.4 {label}").into_bytes())
    }
}

// ========== 内存保存目标 ==========

#[derive(Default)]
pub struct MemorySaver {
    files: Mutex<Vec<(String, Vec<u8>)>>,
}

impl MemorySaver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn files(&self) -> Vec<(String, Vec<u8>)> {
        self.files.lock().unwrap().clone()
    }

    pub fn names(&self) -> Vec<String> {
        self.files().into_iter().map(|(name, _)| name).collect()
    }
}

#[async_trait]
impl SaveTarget for MemorySaver {
    async fn save(&self, filename: &str, bytes: &[u8]) -> AppResult<String> {
        self.files
            .lock()
            .unwrap()
            .push((filename.to_string(), bytes.to_vec()));
        Ok(format!("memory://{filename}"))
    }
}
