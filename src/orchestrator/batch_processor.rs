//! 批量转换 - 编排层
//!
//! ## 职责
//!
//! 1. **分批**：按 `batch_size` 切分文档列表，保持原有顺序
//! 2. **批内并发**：同一批的文档同时下载、渲染（单任务内 `join_all`）
//! 3. **批间串行**：一批全部结束（成功或失败）后等待固定间隔，再开始下一批
//! 4. **失败隔离**：单个文档失败只影响它自己的结果
//!
//! 每个文档恰好产生一个 `ConversionResult`，包括取消时。

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::error::ConversionError;
use crate::models::{ConversionResult, DocumentDescriptor};
use crate::services::{DocumentFetcher, DocumentFragment, PdfRenderer, SaveTarget};
use crate::utils::logging::{log_batch_complete, log_batch_start, truncate_text};

/// 一个待转换的文档及其输出文件名
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionJob {
    pub descriptor: DocumentDescriptor,
    pub filename: String,
}

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub batch_size: usize,
    pub batch_delay: Duration,
    pub fetch_timeout: Duration,
    pub render_timeout: Duration,
    pub dry_run: bool,
}

impl PipelineSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            batch_size: config.max_simultaneous_downloads,
            batch_delay: config.batch_delay(),
            fetch_timeout: config.fetch_timeout(),
            render_timeout: config.render_timeout(),
            dry_run: config.dry_run,
        }
    }
}

/// 按顺序切分为大小不超过 `size` 的批次
pub fn partition<T>(items: &[T], size: usize) -> std::slice::Chunks<'_, T> {
    items.chunks(size.max(1))
}

pub struct BatchConversionPipeline {
    fetcher: Arc<dyn DocumentFetcher>,
    renderer: Arc<dyn PdfRenderer>,
    settings: PipelineSettings,
    cancel: CancellationToken,
    /// 逐个保存模式：每个产物转换完成后立即保存
    immediate_save: Option<Arc<dyn SaveTarget>>,
}

impl BatchConversionPipeline {
    pub fn new(
        fetcher: Arc<dyn DocumentFetcher>,
        renderer: Arc<dyn PdfRenderer>,
        settings: PipelineSettings,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            fetcher,
            renderer,
            settings,
            cancel,
            immediate_save: None,
        }
    }

    pub fn with_immediate_save(mut self, target: Arc<dyn SaveTarget>) -> Self {
        self.immediate_save = Some(target);
        self
    }

    /// 转换所有文档，结果顺序与输入一致
    pub async fn run(&self, jobs: &[ConversionJob]) -> Vec<ConversionResult> {
        let total = jobs.len();
        let batch_size = self.settings.batch_size.max(1);
        let total_batches = total.div_ceil(batch_size);
        let mut results = Vec::with_capacity(total);

        for (batch_index, batch) in partition(jobs, batch_size).enumerate() {
            let batch_num = batch_index + 1;

            if self.cancel.is_cancelled() {
                warn!("⚠️ 已取消，跳过第 {}/{} 批", batch_num, total_batches);
                results.extend(batch.iter().map(cancelled));
                continue;
            }

            let start = batch_index * batch_size + 1;
            log_batch_start(batch_num, total_batches, start, start + batch.len() - 1, total);

            let batch_results = join_all(batch.iter().map(|job| self.convert_one(job))).await;

            let success = batch_results
                .iter()
                .filter(|r| r.error().is_none())
                .count();
            log_batch_complete(batch_num, success, batch_results.len());
            results.extend(batch_results);

            if batch_num < total_batches && !self.settings.batch_delay.is_zero() {
                tokio::select! {
                    _ = self.cancel.cancelled() => {}
                    _ = sleep(self.settings.batch_delay) => {}
                }
            }
        }

        results
    }

    async fn convert_one(&self, job: &ConversionJob) -> ConversionResult {
        info!(
            "⬇️ 准备下载 {} (dry run: {})",
            job.filename, self.settings.dry_run
        );

        if self.settings.dry_run {
            return ConversionResult::dry_run(job.descriptor.clone(), job.filename.clone());
        }

        let outcome = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(ConversionError::Cancelled),
            outcome = self.fetch_and_render(job) => outcome,
        };

        let result = match outcome {
            Ok(bytes) => ConversionResult::converted(job.descriptor.clone(), job.filename.clone(), bytes),
            Err(e) => {
                error!("❌ {} 转换失败: {}", job.descriptor, truncate_text(&e.to_string(), 200));
                return ConversionResult::failed(job.descriptor.clone(), job.filename.clone(), e);
            }
        };

        let Some(target) = &self.immediate_save else {
            return result;
        };
        let saved = match result.artifact() {
            Some(bytes) => target.save(&job.filename, bytes).await,
            None => return result,
        };
        match saved {
            Ok(_) => result,
            Err(e) => {
                error!("❌ {} 保存失败: {}", job.filename, e);
                result.into_failed(ConversionError::Save {
                    filename: job.filename.clone(),
                    message: e.to_string(),
                })
            }
        }
    }

    async fn fetch_and_render(&self, job: &ConversionJob) -> Result<Vec<u8>, ConversionError> {
        let url = &job.descriptor.source_url;

        let html = timeout(self.settings.fetch_timeout, self.fetcher.fetch_html(url))
            .await
            .map_err(|_| ConversionError::Timeout {
                stage: "下载",
                after: self.settings.fetch_timeout,
            })??;

        let fragment = DocumentFragment::parse(&html, url)?;

        let bytes = timeout(
            self.settings.render_timeout,
            self.renderer.render(&fragment, &job.descriptor.label),
        )
        .await
        .map_err(|_| ConversionError::Timeout {
            stage: "渲染",
            after: self.settings.render_timeout,
        })??;

        info!("✓ {} 转换完成 ({} 字节)", job.filename, bytes.len());
        Ok(bytes)
    }
}

fn cancelled(job: &ConversionJob) -> ConversionResult {
    ConversionResult::failed(
        job.descriptor.clone(),
        job.filename.clone(),
        ConversionError::Cancelled,
    )
}
