//! # Payslip Harvest
//!
//! 从工资门户批量下载历史工资单，转换为 PDF 并打包
//!
//! ## 架构设计
//!
//! 本系统采用四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有稀缺资源（Page），只暴露能力
//! - `JsExecutor` - 唯一的 page owner，提供 eval() 能力
//! - `WorkflowStateStore` - 跨页面加载保存导航状态
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"
//! - `ReadinessWaiter` - 轮询等待页面元素
//! - `LinkExtractor` - 从历史表格提取工资单链接
//! - `DocumentFetcher` / `PdfRenderer` - 下载 HTML、渲染 PDF
//! - `ArchiveAssembler` / `SaveTarget` - 打包与保存
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 跨页面导航的状态机
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/app` - 应用入口，管理资源
//! - `orchestrator/harvester` - 单次页面加载的流程
//! - `orchestrator/batch_processor` - 分批并发转换
//!
//! ## 模块结构

pub mod browser;
pub mod config;
pub mod error;
pub mod infrastructure;
pub mod logger;
pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use browser::connect_to_portal;
pub use config::Config;
pub use error::{AppError, AppResult};
pub use infrastructure::JsExecutor;
pub use models::{ConversionResult, DocumentDescriptor, NavigationPhase};
pub use orchestrator::{App, Harvester, RunSummary};
pub use workflow::NavigationStateMachine;
