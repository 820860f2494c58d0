//! 基础设施层
//!
//! 持有稀缺资源（Page），只暴露能力

pub mod js_executor;
pub mod portal_page;
pub mod state_store;

pub use js_executor::JsExecutor;
pub use portal_page::PortalPage;
pub use state_store::{
    FileStateStore, LocalStorageStore, MemoryStateStore, StateStore, WorkflowStateStore,
};
