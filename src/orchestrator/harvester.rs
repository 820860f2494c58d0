//! 单次页面加载的流程编排 - 编排层
//!
//! 每次页面加载都相当于一个全新的进程实例：阶段由 URL + 持久化状态推导，
//! 执行该阶段的动作，然后要么跳转（进入下一次页面加载），要么完成整个流程。

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use url::Url;

use crate::config::{Config, DuplicatePolicy, OutputMode};
use crate::error::{AppError, AppResult};
use crate::infrastructure::{PortalPage, WorkflowStateStore};
use crate::models::{ConversionResult, NavigationPhase};
use crate::orchestrator::batch_processor::{BatchConversionPipeline, ConversionJob};
use crate::services::filename::assign_filenames;
use crate::services::readiness::TableRows;
use crate::services::{ArchiveAssembler, LinkExtractor, ReadinessWaiter, SaveTarget};
use crate::workflow::{NavigationStateMachine, NavigationTargets};

/// 一次运行的统计
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// 提取到的文档数
    pub descriptors: usize,
    pub converted: usize,
    pub dry_run: usize,
    pub failed: usize,
    /// 无法解析的表格行数
    pub row_errors: usize,
    /// 失败或 dry-run 而没有进入输出的文档数
    pub discarded: usize,
    /// 归档保存位置（逐个保存模式下为空）
    pub output: Option<String>,
}

impl RunSummary {
    pub fn from_results(results: &[ConversionResult], row_errors: usize) -> Self {
        let mut summary = Self {
            descriptors: results.len(),
            row_errors,
            ..Self::default()
        };
        for result in results {
            if result.artifact().is_some() {
                summary.converted += 1;
            } else if result.is_dry_run() {
                summary.dry_run += 1;
            } else {
                summary.failed += 1;
            }
        }
        summary.discarded = summary.dry_run + summary.failed;
        summary
    }

    /// 给用户看的统计行
    pub fn lines(&self) -> Vec<String> {
        let mut lines = vec![
            format!("✅ 成功: {}/{}", self.converted, self.descriptors),
            format!("❌ 失败: {}", self.failed),
        ];
        if self.dry_run > 0 {
            lines.push(format!("📝 dry run: {}", self.dry_run));
        }
        if self.discarded > 0 {
            lines.push(format!("🗑️ 未输出: {}", self.discarded));
        }
        if self.row_errors > 0 {
            lines.push(format!("⚠️ 无法解析的表格行: {}", self.row_errors));
        }
        if let Some(output) = &self.output {
            lines.push(format!("💾 输出: {}", output));
        }
        lines
    }
}

/// 单次页面加载的结局
#[derive(Debug)]
pub enum PageOutcome {
    /// 发起了跳转，下一次页面加载继续
    Redirected(Url),
    /// 跳转已落地，下一次页面加载重新判断阶段
    Landed(String),
    /// 整个流程完成
    Completed(RunSummary),
}

/// 输出方式与保存目标
pub struct OutputPlan {
    pub mode: OutputMode,
    pub target: Arc<dyn SaveTarget>,
    pub duplicate_policy: DuplicatePolicy,
}

pub struct Harvester {
    page: Arc<dyn PortalPage>,
    store: WorkflowStateStore,
    waiter: ReadinessWaiter,
    targets: NavigationTargets,
    listing_row_selector: String,
    extractor: LinkExtractor,
    pipeline: BatchConversionPipeline,
    assembler: ArchiveAssembler,
    output: OutputPlan,
    max_page_loads: usize,
    cancel: CancellationToken,
}

impl Harvester {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: &Config,
        page: Arc<dyn PortalPage>,
        store: WorkflowStateStore,
        waiter: ReadinessWaiter,
        pipeline: BatchConversionPipeline,
        output: OutputPlan,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            page,
            store,
            waiter,
            targets: NavigationTargets::from_config(config),
            listing_row_selector: config.listing_row_selector.clone(),
            extractor: LinkExtractor::from_config(config),
            pipeline,
            assembler: ArchiveAssembler::new(config.archive_name.clone()),
            output,
            max_page_loads: config.max_page_loads,
            cancel,
        }
    }

    /// 运行直到完成，最多经历 `max_page_loads` 次页面加载
    pub async fn run(&self) -> AppResult<RunSummary> {
        for load in 1..=self.max_page_loads {
            info!("🔄 第 {}/{} 次页面加载", load, self.max_page_loads);
            match self.run_page_instance().await? {
                PageOutcome::Redirected(url) => {
                    self.settle_navigation(&url).await;
                }
                PageOutcome::Landed(url) => {
                    info!("✓ 已到达历史页面: {}", url);
                }
                PageOutcome::Completed(summary) => return Ok(summary),
            }
        }
        Err(AppError::NavigationPrecondition(format!(
            "经过 {} 次页面加载仍未到达工资单历史页面",
            self.max_page_loads
        )))
    }

    /// 一次页面加载：从空白状态推导阶段并执行
    pub async fn run_page_instance(&self) -> AppResult<PageOutcome> {
        let navigation = NavigationStateMachine::new(
            self.page.as_ref(),
            &self.store,
            &self.waiter,
            &self.targets,
            &self.cancel,
        );

        match navigation.current_phase().await? {
            NavigationPhase::AwaitingEntry => {
                let url = navigation.navigate_to_history().await?;
                Ok(PageOutcome::Redirected(url))
            }
            NavigationPhase::AwaitingHistoryListing => {
                let url = navigation.await_history_listing().await?;
                Ok(PageOutcome::Landed(url))
            }
            NavigationPhase::ReadyForExtraction => {
                // 先消费状态，提取失败也不会卡在"已跳转"
                navigation.consume().await?;
                self.extract_and_convert().await.map(PageOutcome::Completed)
            }
        }
    }

    async fn settle_navigation(&self, url: &Url) {
        match tokio::time::timeout(self.waiter.timeout(), self.page.wait_for_navigation()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("⚠️ 等待跳转到 {} 时出错: {}", url, e),
            Err(_) => warn!("⚠️ 等待跳转到 {} 超时", url),
        }
    }

    async fn extract_and_convert(&self) -> AppResult<RunSummary> {
        let rows = self
            .waiter
            .wait(
                &TableRows::new(self.page.as_ref(), &self.listing_row_selector),
                &self.cancel,
            )
            .await?;
        info!("✓ 历史列表已加载: {} 行", rows.len());

        let extraction = self.extractor.extract_all(&rows);
        info!("✓ 找到 {} 份工资单", extraction.descriptors.len());

        let filenames = assign_filenames(&extraction.descriptors, self.output.duplicate_policy)?;
        let jobs: Vec<ConversionJob> = extraction
            .descriptors
            .into_iter()
            .zip(filenames)
            .map(|(descriptor, filename)| ConversionJob {
                descriptor,
                filename,
            })
            .collect();

        let results = self.pipeline.run(&jobs).await;
        let mut summary = RunSummary::from_results(&results, extraction.errors.len());

        if self.output.mode == OutputMode::Archive {
            let archive = self.assembler.assemble(&results)?;
            summary.discarded = archive.discarded;
            if archive.is_empty() {
                warn!("⚠️ 没有可归档的文件，不生成 {}", archive.file_name);
            } else {
                let location = self
                    .assembler
                    .deliver(archive, self.output.target.as_ref())
                    .await?;
                summary.output = Some(location);
            }
        }

        Ok(summary)
    }
}
