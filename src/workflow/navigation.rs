//! 导航状态机 - 流程层
//!
//! ```text
//! AwaitingEntry ──点击菜单/解析员工号/写状态/跳转──▶ AwaitingHistoryListing
//! AwaitingHistoryListing ──(页面重新加载，URL 命中标记)──▶ ReadyForExtraction
//! ```
//!
//! 每次整页跳转后，阶段都由"当前 URL + 持久化状态"重新推导。
//! 到达 `ReadyForExtraction` 时先清掉状态，保证一次跳转只被消费一次。

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use url::Url;

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::infrastructure::{PortalPage, WorkflowStateStore};
use crate::models::{EmployeeIdentity, NavigationPhase, WorkflowState};
use crate::services::readiness::{
    CurrentUrl, ElementById, ElementTexts, ReadinessWaiter, UrlContains,
};

/// 门户地址和入口页面结构
#[derive(Debug, Clone)]
pub struct NavigationTargets {
    pub base_url: String,
    pub history_path: String,
    pub history_url_marker: String,
    pub details_menu_id: String,
    pub identity_cell_selector: String,
}

impl NavigationTargets {
    pub fn from_config(config: &Config) -> Self {
        Self {
            base_url: config.portal_base_url.clone(),
            history_path: config.history_path.clone(),
            history_url_marker: config.history_url_marker.clone(),
            details_menu_id: config.details_menu_id.clone(),
            identity_cell_selector: config.identity_cell_selector.clone(),
        }
    }

    /// 历史页面地址：`{base}/{path}?Z_EMPLOYEE_NUMBER=<id>&P_MODE=R`
    pub fn history_url(&self, employee_id: &str) -> AppResult<Url> {
        let invalid = |e: url::ParseError| {
            AppError::NavigationPrecondition(format!("无法构造历史页面地址: {}", e))
        };

        let mut base = self.base_url.clone();
        if !base.ends_with('/') {
            base.push('/');
        }
        let mut url = Url::parse(&base)
            .and_then(|b| b.join(self.history_path.trim_start_matches('/')))
            .map_err(invalid)?;
        url.query_pairs_mut()
            .append_pair("Z_EMPLOYEE_NUMBER", employee_id)
            .append_pair("P_MODE", "R");
        Ok(url)
    }
}

/// 由当前地址和持久化状态推导阶段
pub fn detect_phase(url: &str, state: Option<&WorkflowState>, marker: &str) -> NavigationPhase {
    if url.contains(marker) {
        NavigationPhase::ReadyForExtraction
    } else if state.is_some() {
        NavigationPhase::AwaitingHistoryListing
    } else {
        NavigationPhase::AwaitingEntry
    }
}

pub struct NavigationStateMachine<'a, P: PortalPage + ?Sized> {
    page: &'a P,
    store: &'a WorkflowStateStore,
    waiter: &'a ReadinessWaiter,
    targets: &'a NavigationTargets,
    cancel: &'a CancellationToken,
}

impl<'a, P: PortalPage + ?Sized> NavigationStateMachine<'a, P> {
    pub fn new(
        page: &'a P,
        store: &'a WorkflowStateStore,
        waiter: &'a ReadinessWaiter,
        targets: &'a NavigationTargets,
        cancel: &'a CancellationToken,
    ) -> Self {
        Self {
            page,
            store,
            waiter,
            targets,
            cancel,
        }
    }

    /// 当前阶段
    pub async fn current_phase(&self) -> AppResult<NavigationPhase> {
        let url = self
            .waiter
            .wait(&CurrentUrl::new(self.page), self.cancel)
            .await?;
        let state = self.store.load().await?;
        let phase = detect_phase(&url, state.as_ref(), &self.targets.history_url_marker);
        info!("📍 当前页面: {} → {:?}", url, phase);
        Ok(phase)
    }

    /// AwaitingEntry → AwaitingHistoryListing
    ///
    /// 员工号解析失败时不写状态、不跳转
    pub async fn navigate_to_history(&self) -> AppResult<Url> {
        let menu_id = self.targets.details_menu_id.as_str();
        self.waiter
            .wait(&ElementById::new(self.page, menu_id), self.cancel)
            .await?;
        self.page.click_element(menu_id).await?;
        info!("✓ 已打开个人信息菜单");

        let cells = self
            .waiter
            .wait(
                &ElementTexts::new(self.page, &self.targets.identity_cell_selector),
                self.cancel,
            )
            .await?;
        let details = cells.first().map(String::as_str).unwrap_or_default();
        let identity = EmployeeIdentity::parse(details)?;
        info!("✓ 员工号: {}", identity.employee_id);

        let url = self.targets.history_url(&identity.employee_id)?;
        self.store
            .save(&WorkflowState::navigated(&identity.employee_id, url.as_str()))
            .await?;

        if let Err(e) = self.page.redirect(&url).await {
            // 跳转没发出去，不能留下"已跳转"的状态
            self.clear_quietly().await;
            return Err(e);
        }
        info!("➡️ 跳转到工资单历史页面: {}", url);
        Ok(url)
    }

    /// AwaitingHistoryListing：等待跳转落地
    ///
    /// 超时或取消时清掉状态，下次从入口重新开始
    pub async fn await_history_listing(&self) -> AppResult<String> {
        let query = UrlContains::new(self.page, &self.targets.history_url_marker);
        match self.waiter.wait(&query, self.cancel).await {
            Ok(url) => Ok(url),
            Err(e) => {
                warn!("⚠️ 历史页面没有出现，清除工作流状态: {}", e);
                self.clear_quietly().await;
                Err(e)
            }
        }
    }

    /// 终态：消费状态
    pub async fn consume(&self) -> AppResult<()> {
        self.store.clear().await
    }

    async fn clear_quietly(&self) {
        if let Err(e) = self.store.clear().await {
            warn!("⚠️ 清除工作流状态失败: {}", e);
        }
    }
}
