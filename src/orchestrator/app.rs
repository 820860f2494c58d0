//! 应用入口 - 编排层
//!
//! 负责资源和装配：连接浏览器、按配置选择各个后端、运行收割流程、输出统计。
//! 唯一持有 Browser 的模块。

use std::sync::Arc;

use chromiumoxide::Browser;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::browser;
use crate::config::{Config, Delivery, FetchBackend, OutputMode, StateBackend};
use crate::error::AppResult;
use crate::infrastructure::{
    FileStateStore, JsExecutor, LocalStorageStore, PortalPage, StateStore, WorkflowStateStore,
};
use crate::orchestrator::batch_processor::{BatchConversionPipeline, PipelineSettings};
use crate::orchestrator::harvester::{Harvester, OutputPlan, RunSummary};
use crate::services::{
    BrowserDownloadSaver, ChromePdfRenderer, DocumentFetcher, FileSystemSaver, HttpFetcher,
    PageFetcher, ReadinessWaiter, RenderOptions, SaveTarget,
};
use crate::utils::logging::{append_summary, init_log_file, log_startup, print_final_stats};

/// 应用主结构
pub struct App {
    config: Config,
    _browser: Arc<Browser>,
    harvester: Harvester,
}

impl App {
    /// 初始化应用
    pub async fn initialize(config: Config, cancel: CancellationToken) -> AppResult<Self> {
        init_log_file(&config.output_log_file)?;
        log_startup(&config);

        let (browser, page) = browser::connect_to_portal(
            config.browser_debug_port,
            &config.portal_url_hint,
            config.portal_base_url.as_str(),
        )
        .await?;
        let browser = Arc::new(browser);

        // JsExecutor 持有门户页面
        let executor = JsExecutor::new(page);

        let state_backend: Arc<dyn StateStore> = match config.state_backend {
            StateBackend::LocalStorage => {
                Arc::new(LocalStorageStore::new(executor.clone(), config.state_key.clone()))
            }
            StateBackend::File => Arc::new(FileStateStore::new(&config.state_file)),
        };
        let store = WorkflowStateStore::new(state_backend, config.state_ttl());

        let fetcher: Arc<dyn DocumentFetcher> = match config.fetch_backend {
            FetchBackend::Page => Arc::new(PageFetcher::new(executor.clone())),
            FetchBackend::Http => Arc::new(HttpFetcher::from_page(&executor).await?),
        };
        let renderer = Arc::new(ChromePdfRenderer::new(
            browser.clone(),
            RenderOptions::from_config(&config),
        ));

        let target: Arc<dyn SaveTarget> = match config.delivery {
            Delivery::Filesystem => Arc::new(FileSystemSaver::new(&config.output_dir)),
            Delivery::BrowserDownload => Arc::new(BrowserDownloadSaver::new(executor.clone())),
        };

        let mut pipeline = BatchConversionPipeline::new(
            fetcher,
            renderer,
            PipelineSettings::from_config(&config),
            cancel.clone(),
        );
        if config.output_mode == OutputMode::PerFile {
            pipeline = pipeline.with_immediate_save(target.clone());
        }

        let page: Arc<dyn PortalPage> = Arc::new(executor);
        let harvester = Harvester::new(
            &config,
            page,
            store,
            ReadinessWaiter::new(config.poll_interval(), config.readiness_timeout()),
            pipeline,
            OutputPlan {
                mode: config.output_mode,
                target,
                duplicate_policy: config.duplicate_policy,
            },
            cancel,
        );

        Ok(Self {
            config,
            _browser: browser,
            harvester,
        })
    }

    /// 运行应用主逻辑
    pub async fn run(&self) -> AppResult<RunSummary> {
        let summary = self.harvester.run().await?;

        print_final_stats(&summary, &self.config.output_log_file);
        append_summary(&summary, &self.config.output_log_file)?;
        info!("🎉 全部完成");

        Ok(summary)
    }
}
