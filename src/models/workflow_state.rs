//! 跨页面加载的工作流状态
//!
//! 每次整页跳转后程序都从空白状态重新开始，这条记录是唯一的延续手段。
//! 记录带 schema 版本号，版本不认识就丢弃，从头开始。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 当前记录格式的版本
pub const WORKFLOW_SCHEMA_VERSION: u32 = 1;

/// 工作流所处阶段（由 URL + 持久化状态推导）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationPhase {
    /// 需要点进菜单找员工号，然后跳转
    AwaitingEntry,
    /// 已经发起跳转，历史页面还在加载
    AwaitingHistoryListing,
    /// 历史列表页面已就绪，可以提取
    ReadyForExtraction,
}

/// 已持久化的步骤
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStep {
    /// 已经跳转到历史页面
    Navigated,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowState {
    pub schema_version: u32,
    pub step: WorkflowStep,
    pub employee_id: String,
    pub target_url: String,
    pub navigated_at: DateTime<Utc>,
}

impl WorkflowState {
    pub fn navigated(employee_id: impl Into<String>, target_url: impl Into<String>) -> Self {
        Self {
            schema_version: WORKFLOW_SCHEMA_VERSION,
            step: WorkflowStep::Navigated,
            employee_id: employee_id.into(),
            target_url: target_url.into(),
            navigated_at: Utc::now(),
        }
    }

    /// 记录是否已超过有效期
    pub fn is_stale(&self, now: DateTime<Utc>, ttl: std::time::Duration) -> bool {
        match chrono::Duration::from_std(ttl) {
            Ok(ttl) => now - self.navigated_at > ttl,
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn serializes_with_schema_version() {
        let state = WorkflowState::navigated("12345", "https://portal.test/ords/wss_vzbp/x");
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["schema_version"], WORKFLOW_SCHEMA_VERSION);
        assert_eq!(json["step"], "navigated");
        let back: WorkflowState = serde_json::from_value(json).unwrap();
        assert_eq!(back, state);
    }

    #[test]
    fn staleness_follows_ttl() {
        let mut state = WorkflowState::navigated("1", "u");
        let now = Utc::now();
        state.navigated_at = now - chrono::Duration::minutes(30);
        assert!(state.is_stale(now, Duration::from_secs(15 * 60)));
        assert!(!state.is_stale(now, Duration::from_secs(60 * 60)));
    }
}
