//! 单个文档的转换结果

use crate::error::ConversionError;
use crate::models::DocumentDescriptor;

/// 转换结局
///
/// 成功时带 PDF 字节，失败时带错误；dry-run 两者都没有，单独标记。
#[derive(Debug, Clone, PartialEq)]
pub enum ConversionOutcome {
    Converted(Vec<u8>),
    Failed(ConversionError),
    DryRun,
}

/// 每个文档恰好产生一个结果
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionResult {
    pub descriptor: DocumentDescriptor,
    /// 保存时使用的文件名（已去重、已清理非法字符）
    pub filename: String,
    pub outcome: ConversionOutcome,
}

impl ConversionResult {
    pub fn converted(descriptor: DocumentDescriptor, filename: String, bytes: Vec<u8>) -> Self {
        Self {
            descriptor,
            filename,
            outcome: ConversionOutcome::Converted(bytes),
        }
    }

    pub fn failed(descriptor: DocumentDescriptor, filename: String, error: ConversionError) -> Self {
        Self {
            descriptor,
            filename,
            outcome: ConversionOutcome::Failed(error),
        }
    }

    pub fn dry_run(descriptor: DocumentDescriptor, filename: String) -> Self {
        Self {
            descriptor,
            filename,
            outcome: ConversionOutcome::DryRun,
        }
    }

    pub fn artifact(&self) -> Option<&[u8]> {
        match &self.outcome {
            ConversionOutcome::Converted(bytes) => Some(bytes),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&ConversionError> {
        match &self.outcome {
            ConversionOutcome::Failed(e) => Some(e),
            _ => None,
        }
    }

    pub fn is_dry_run(&self) -> bool {
        matches!(self.outcome, ConversionOutcome::DryRun)
    }

    /// 转为失败结果，丢弃已有的产物（例如逐个保存时写盘失败）
    pub fn into_failed(self, error: ConversionError) -> Self {
        Self::failed(self.descriptor, self.filename, error)
    }
}
