//! 归档组装 - 业务能力层
//!
//! 把成功转换的 PDF 打成一个 zip，然后交给保存目标。

use std::collections::HashSet;
use std::io::{Cursor, Write};

use tracing::{info, warn};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::{AppError, AppResult};
use crate::models::ConversionResult;
use crate::services::saver::SaveTarget;

/// 组装好的归档（只在本次运行中存在）
#[derive(Debug)]
pub struct Archive {
    pub file_name: String,
    /// 条目名（按加入顺序）
    pub entries: Vec<String>,
    pub bytes: Vec<u8>,
    /// 失败或 dry-run 而没有进入归档的结果数
    pub discarded: usize,
}

impl Archive {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub struct ArchiveAssembler {
    file_name: String,
}

impl ArchiveAssembler {
    pub fn new(file_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
        }
    }

    /// 只收集带产物的结果；条目名重复直接报错，不覆盖
    pub fn assemble(&self, results: &[ConversionResult]) -> AppResult<Archive> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

        let mut names = HashSet::new();
        let mut entries = Vec::new();
        let mut discarded = 0;

        for result in results {
            let Some(artifact) = result.artifact() else {
                discarded += 1;
                continue;
            };

            if !names.insert(result.filename.to_lowercase()) {
                return Err(AppError::ArchiveAssembly(format!(
                    "归档中已存在同名文件: {}",
                    result.filename
                )));
            }

            writer.start_file(result.filename.as_str(), options)?;
            writer.write_all(artifact)?;
            entries.push(result.filename.clone());
        }

        let bytes = writer.finish()?.into_inner();

        if discarded > 0 {
            warn!("⚠️ {} 个文档没有进入归档（失败或 dry-run）", discarded);
        }
        info!("📦 归档完成: {} 个文件，{} 字节", entries.len(), bytes.len());

        Ok(Archive {
            file_name: self.file_name.clone(),
            entries,
            bytes,
            discarded,
        })
    }

    /// 保存归档，交出后 `Archive` 即被丢弃
    pub async fn deliver(&self, archive: Archive, target: &dyn SaveTarget) -> AppResult<String> {
        target
            .save(&archive.file_name, &archive.bytes)
            .await
            .map_err(|e| AppError::ArchiveAssembly(format!("保存 {} 失败: {}", archive.file_name, e)))
    }
}
