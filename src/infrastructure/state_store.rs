//! 跨页面状态存储
//!
//! 底层只存一段字符串（localStorage / 文件 / 内存），
//! `WorkflowStateStore` 负责 JSON 编解码、版本检查和过期检查。

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, warn};

use crate::error::{AppError, AppResult};
use crate::infrastructure::JsExecutor;
use crate::models::{WorkflowState, WORKFLOW_SCHEMA_VERSION};

/// 原始键值存储
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn read(&self) -> AppResult<Option<String>>;
    async fn write(&self, value: &str) -> AppResult<()>;
    async fn clear(&self) -> AppResult<()>;
}

/// 门户页面的 localStorage
///
/// 入口页面和历史页面同源，跳转后仍然能读到
pub struct LocalStorageStore {
    executor: JsExecutor,
    key: String,
}

impl LocalStorageStore {
    pub fn new(executor: JsExecutor, key: impl Into<String>) -> Self {
        Self {
            executor,
            key: key.into(),
        }
    }

    fn quoted_key(&self) -> AppResult<String> {
        Ok(serde_json::to_string(&self.key)?)
    }
}

#[async_trait]
impl StateStore for LocalStorageStore {
    async fn read(&self) -> AppResult<Option<String>> {
        let js_code = format!("window.localStorage.getItem({})", self.quoted_key()?);
        self.executor.eval_as(js_code).await
    }

    async fn write(&self, value: &str) -> AppResult<()> {
        let js_code = format!(
            "(() => {{ window.localStorage.setItem({}, {}); return true; }})()",
            self.quoted_key()?,
            serde_json::to_string(value)?
        );
        self.executor.eval(js_code).await?;
        Ok(())
    }

    async fn clear(&self) -> AppResult<()> {
        let js_code = format!(
            "(() => {{ window.localStorage.removeItem({}); return true; }})()",
            self.quoted_key()?
        );
        self.executor.eval(js_code).await?;
        Ok(())
    }
}

/// 本地 JSON 文件
pub struct FileStateStore {
    path: PathBuf,
}

impl FileStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl StateStore for FileStateStore {
    async fn read(&self) -> AppResult<Option<String>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write(&self, value: &str) -> AppResult<()> {
        tokio::fs::write(&self.path, value).await?;
        Ok(())
    }

    async fn clear(&self) -> AppResult<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// 内存存储，同一进程内的多次"页面加载"共享
#[derive(Default)]
pub struct MemoryStateStore {
    value: Mutex<Option<String>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> AppResult<std::sync::MutexGuard<'_, Option<String>>> {
        self.value
            .lock()
            .map_err(|_| AppError::State("内存状态锁已损坏".to_string()))
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn read(&self) -> AppResult<Option<String>> {
        Ok(self.lock()?.clone())
    }

    async fn write(&self, value: &str) -> AppResult<()> {
        *self.lock()? = Some(value.to_string());
        Ok(())
    }

    async fn clear(&self) -> AppResult<()> {
        *self.lock()? = None;
        Ok(())
    }
}

/// 带版本和过期检查的工作流状态存储
#[derive(Clone)]
pub struct WorkflowStateStore {
    backend: Arc<dyn StateStore>,
    ttl: Duration,
}

impl WorkflowStateStore {
    pub fn new(backend: Arc<dyn StateStore>, ttl: Duration) -> Self {
        Self { backend, ttl }
    }

    /// 读取状态
    ///
    /// 无法解析、版本不认识或已过期的记录会被清掉并当作没有状态
    pub async fn load(&self) -> AppResult<Option<WorkflowState>> {
        let Some(raw) = self.backend.read().await? else {
            return Ok(None);
        };

        let state: WorkflowState = match serde_json::from_str(&raw) {
            Ok(state) => state,
            Err(e) => {
                warn!("⚠️ 丢弃无法解析的工作流状态: {} ({})", raw, e);
                self.backend.clear().await?;
                return Ok(None);
            }
        };

        if state.schema_version != WORKFLOW_SCHEMA_VERSION {
            warn!(
                "⚠️ 丢弃版本不匹配的工作流状态: v{} (当前 v{})",
                state.schema_version, WORKFLOW_SCHEMA_VERSION
            );
            self.backend.clear().await?;
            return Ok(None);
        }

        if state.is_stale(Utc::now(), self.ttl) {
            warn!(
                "⚠️ 丢弃过期的工作流状态 (跳转于 {})",
                state.navigated_at.format("%Y-%m-%d %H:%M:%S")
            );
            self.backend.clear().await?;
            return Ok(None);
        }

        debug!("读取到工作流状态: {:?}", state);
        Ok(Some(state))
    }

    pub async fn save(&self, state: &WorkflowState) -> AppResult<()> {
        let raw = serde_json::to_string(state)?;
        self.backend.write(&raw).await
    }

    pub async fn clear(&self) -> AppResult<()> {
        self.backend.clear().await
    }
}
