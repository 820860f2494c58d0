//! 业务能力层
//!
//! 描述"我能做什么"：等待页面、提取链接、下载、渲染、打包、保存。
//! 不关心流程顺序。

pub mod archive;
pub mod fetcher;
pub mod filename;
pub mod link_extractor;
pub mod readiness;
pub mod renderer;
pub mod saver;

pub use archive::{Archive, ArchiveAssembler};
pub use fetcher::{DocumentFetcher, HttpFetcher, PageFetcher};
pub use link_extractor::{ColumnLocator, Extraction, LinkExtractor};
pub use readiness::{DomQuery, Probe, ReadinessWaiter};
pub use renderer::{ChromePdfRenderer, DocumentFragment, PdfRenderer, RenderOptions};
pub use saver::{BrowserDownloadSaver, FileSystemSaver, SaveTarget};
