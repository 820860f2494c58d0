//! 编排层（Orchestration Layer）
//!
//! ## 模块划分
//!
//! ### `app` - 应用入口
//! - 连接浏览器，按配置装配各个后端
//! - 输出全局统计信息
//!
//! ### `harvester` - 页面加载编排
//! - 每次页面加载从 URL + 持久化状态推导阶段
//! - 导航阶段交给 `workflow::NavigationStateMachine`
//! - 终止阶段：提取链接 → 批量转换 → 打包 / 逐个保存
//!
//! ### `batch_processor` - 批量转换
//! - 分批并发下载、渲染，失败隔离
//!
//! ## 层次关系
//!
//! ```text
//! app
//!     ↓
//! harvester (每次页面加载)
//!     ↓
//! workflow::NavigationStateMachine / batch_processor
//!     ↓
//! services (能力层：readiness / extract / fetch / render / archive / save)
//!     ↓
//! infrastructure (基础设施：JsExecutor、状态存储)
//! ```

pub mod app;
pub mod batch_processor;
pub mod harvester;

pub use app::App;
pub use batch_processor::{partition, BatchConversionPipeline, ConversionJob, PipelineSettings};
pub use harvester::{Harvester, OutputPlan, PageOutcome, RunSummary};
