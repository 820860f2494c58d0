//! 就绪等待 - 业务能力层
//!
//! 按固定间隔反复查询页面，直到查询结果"就绪"。
//! 带超时（找不到目标时报 `ReadinessTimeout`）和取消令牌（页面离开 / Ctrl-C）。

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::{interval, sleep, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{AppError, AppResult};
use crate::infrastructure::PortalPage;
use crate::models::TableRow;

/// 一次查询的结果
#[derive(Debug, Clone, PartialEq)]
pub struct Probe<T> {
    pub result: T,
    pub ready: bool,
}

impl<T> Probe<T> {
    pub fn new(result: T, ready: bool) -> Self {
        Self { result, ready }
    }
}

/// 对当前页面的一次纯查询
#[async_trait]
pub trait DomQuery: Send + Sync {
    type Output: Send;

    /// 日志和超时错误里显示的查询描述
    fn describe(&self) -> String;

    async fn probe(&self) -> AppResult<Probe<Self::Output>>;
}

/// 轮询等待器
#[derive(Debug, Clone)]
pub struct ReadinessWaiter {
    poll_interval: Duration,
    timeout: Duration,
}

impl ReadinessWaiter {
    pub fn new(poll_interval: Duration, timeout: Duration) -> Self {
        Self {
            poll_interval,
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// 等待查询就绪并返回第一次就绪时的结果
    ///
    /// 查询本身出错（例如跳转过程中执行上下文被销毁）只记录日志，继续轮询
    pub async fn wait<Q: DomQuery + ?Sized>(
        &self,
        query: &Q,
        cancel: &CancellationToken,
    ) -> AppResult<Q::Output> {
        let started = Instant::now();
        let deadline = sleep(self.timeout);
        tokio::pin!(deadline);

        let mut ticker = interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut attempts: u32 = 0;
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(self.cancelled(query)),
                _ = &mut deadline => return Err(self.timed_out(query, started)),
                _ = ticker.tick() => {}
            }

            attempts += 1;
            // 查询本身也可能卡住（跳转中或被对话框挡住），同样受超时和取消约束
            let probed = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(self.cancelled(query)),
                _ = &mut deadline => return Err(self.timed_out(query, started)),
                probed = query.probe() => probed,
            };

            match probed {
                Ok(probe) if probe.ready => {
                    debug!("{} 已就绪 (第 {} 次查询)", query.describe(), attempts);
                    return Ok(probe.result);
                }
                Ok(_) => {
                    debug!(
                        "页面中还没有 {}，{}ms 后重试",
                        query.describe(),
                        self.poll_interval.as_millis()
                    );
                }
                Err(e) => {
                    debug!("查询 {} 出错，{}ms 后重试: {}", query.describe(), self.poll_interval.as_millis(), e);
                }
            }
        }
    }

    fn cancelled<Q: DomQuery + ?Sized>(&self, query: &Q) -> AppError {
        debug!("取消等待: {}", query.describe());
        AppError::Cancelled
    }

    fn timed_out<Q: DomQuery + ?Sized>(&self, query: &Q, started: Instant) -> AppError {
        AppError::readiness_timeout(query.describe(), started.elapsed())
    }
}

// ========== 具体查询 ==========

/// 指定 id 的元素存在
pub struct ElementById<'a, P: ?Sized> {
    page: &'a P,
    id: &'a str,
}

impl<'a, P: PortalPage + ?Sized> ElementById<'a, P> {
    pub fn new(page: &'a P, id: &'a str) -> Self {
        Self { page, id }
    }
}

#[async_trait]
impl<'a, P: PortalPage + ?Sized> DomQuery for ElementById<'a, P> {
    type Output = ();

    fn describe(&self) -> String {
        format!("#{}", self.id)
    }

    async fn probe(&self) -> AppResult<Probe<()>> {
        let exists = self.page.element_exists(self.id).await?;
        Ok(Probe::new((), exists))
    }
}

/// 匹配选择器的元素文字，至少一个时就绪
pub struct ElementTexts<'a, P: ?Sized> {
    page: &'a P,
    selector: &'a str,
}

impl<'a, P: PortalPage + ?Sized> ElementTexts<'a, P> {
    pub fn new(page: &'a P, selector: &'a str) -> Self {
        Self { page, selector }
    }
}

#[async_trait]
impl<'a, P: PortalPage + ?Sized> DomQuery for ElementTexts<'a, P> {
    type Output = Vec<String>;

    fn describe(&self) -> String {
        format!("\"{}\"", self.selector)
    }

    async fn probe(&self) -> AppResult<Probe<Vec<String>>> {
        let texts = self.page.element_texts(self.selector).await?;
        let ready = !texts.is_empty();
        Ok(Probe::new(texts, ready))
    }
}

/// 表格行快照，至少一行时就绪
pub struct TableRows<'a, P: ?Sized> {
    page: &'a P,
    selector: &'a str,
}

impl<'a, P: PortalPage + ?Sized> TableRows<'a, P> {
    pub fn new(page: &'a P, selector: &'a str) -> Self {
        Self { page, selector }
    }
}

#[async_trait]
impl<'a, P: PortalPage + ?Sized> DomQuery for TableRows<'a, P> {
    type Output = Vec<TableRow>;

    fn describe(&self) -> String {
        format!("\"{}\"", self.selector)
    }

    async fn probe(&self) -> AppResult<Probe<Vec<TableRow>>> {
        let rows = self.page.table_rows(self.selector).await?;
        let ready = !rows.is_empty();
        Ok(Probe::new(rows, ready))
    }
}

/// 当前地址（页面可以执行脚本即就绪，用于跳转后等待新页面可用）
pub struct CurrentUrl<'a, P: ?Sized> {
    page: &'a P,
}

impl<'a, P: PortalPage + ?Sized> CurrentUrl<'a, P> {
    pub fn new(page: &'a P) -> Self {
        Self { page }
    }
}

#[async_trait]
impl<'a, P: PortalPage + ?Sized> DomQuery for CurrentUrl<'a, P> {
    type Output = String;

    fn describe(&self) -> String {
        "当前页面地址".to_string()
    }

    async fn probe(&self) -> AppResult<Probe<String>> {
        let url = self.page.current_url().await?;
        Ok(Probe::new(url, true))
    }
}

/// 当前地址包含指定片段
pub struct UrlContains<'a, P: ?Sized> {
    page: &'a P,
    marker: &'a str,
}

impl<'a, P: PortalPage + ?Sized> UrlContains<'a, P> {
    pub fn new(page: &'a P, marker: &'a str) -> Self {
        Self { page, marker }
    }
}

#[async_trait]
impl<'a, P: PortalPage + ?Sized> DomQuery for UrlContains<'a, P> {
    type Output = String;

    fn describe(&self) -> String {
        format!("URL 包含 '{}'", self.marker)
    }

    async fn probe(&self) -> AppResult<Probe<String>> {
        let url = self.page.current_url().await?;
        let ready = url.contains(self.marker);
        Ok(Probe::new(url, ready))
    }
}
