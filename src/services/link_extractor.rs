//! 链接提取 - 业务能力层
//!
//! 把历史列表表格的行快照转换为有序的 `DocumentDescriptor` 列表。
//! 表格开头固定有列标题行和 "Year to Date" 汇总行，数量由配置给出。

use tracing::{debug, warn};
use url::Url;

use crate::config::Config;
use crate::error::RowExtractionError;
use crate::models::{DocumentDescriptor, TableCell, TableRow};

/// 目标列的定位方式
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnLocator {
    /// 固定位置（从 0 开始）
    Index(usize),
    /// 在被丢弃的标题行中按列名查找，找不到时退回固定位置
    Header {
        label: String,
        fallback_index: Option<usize>,
    },
}

/// 提取结果（按行分开成功与失败）
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Extraction {
    pub descriptors: Vec<DocumentDescriptor>,
    pub errors: Vec<RowExtractionError>,
}

#[derive(Debug, Clone)]
pub struct LinkExtractor {
    header_rows: usize,
    column: ColumnLocator,
}

impl LinkExtractor {
    pub fn new(header_rows: usize, column: ColumnLocator) -> Self {
        Self {
            header_rows,
            column,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.table_header_row_count,
            ColumnLocator::Header {
                label: config.period_end_column_label.clone(),
                fallback_index: Some(config.period_end_column_index),
            },
        )
    }

    /// 逐行提取，每个数据行对应一个结果
    ///
    /// 行数不足 `header_rows` 时返回空列表
    pub fn extract(&self, rows: &[TableRow]) -> Vec<Result<DocumentDescriptor, RowExtractionError>> {
        let header_count = self.header_rows.min(rows.len());
        let (headers, data_rows) = rows.split_at(header_count);
        let column = self.resolve_column(headers);

        data_rows
            .iter()
            .enumerate()
            .map(|(offset, row)| {
                let row_number = header_count + offset + 1;
                match column {
                    Some(index) => extract_row(row, row_number, index),
                    None => Err(RowExtractionError::MissingColumn {
                        row: row_number,
                        column: self.column_name(),
                    }),
                }
            })
            .collect()
    }

    /// 提取并分开成功与失败，失败的行记录警告
    pub fn extract_all(&self, rows: &[TableRow]) -> Extraction {
        let mut extraction = Extraction::default();
        for result in self.extract(rows) {
            match result {
                Ok(descriptor) => extraction.descriptors.push(descriptor),
                Err(e) => {
                    warn!("⚠️ 跳过表格行: {}", e);
                    extraction.errors.push(e);
                }
            }
        }
        extraction
    }

    fn resolve_column(&self, headers: &[TableRow]) -> Option<usize> {
        match &self.column {
            ColumnLocator::Index(index) => Some(*index),
            ColumnLocator::Header {
                label,
                fallback_index,
            } => {
                let found = headers.iter().find_map(|row| {
                    row.cells
                        .iter()
                        .position(|cell| cell.text.trim().eq_ignore_ascii_case(label.trim()))
                });
                match found {
                    Some(index) => {
                        debug!("列 '{}' 位于第 {} 列", label, index + 1);
                        Some(index)
                    }
                    None => {
                        if let Some(index) = fallback_index {
                            debug!("标题行中没有 '{}'，使用固定位置 {}", label, index + 1);
                        }
                        *fallback_index
                    }
                }
            }
        }
    }

    fn column_name(&self) -> String {
        match &self.column {
            ColumnLocator::Index(index) => format!("#{}", index + 1),
            ColumnLocator::Header { label, .. } => format!("'{}'", label),
        }
    }
}

fn extract_row(
    row: &TableRow,
    row_number: usize,
    column: usize,
) -> Result<DocumentDescriptor, RowExtractionError> {
    let cell: &TableCell = row
        .cells
        .get(column)
        .ok_or_else(|| RowExtractionError::MissingColumn {
            row: row_number,
            column: format!("#{}", column + 1),
        })?;

    let link = cell
        .links
        .first()
        .ok_or(RowExtractionError::MissingLink { row: row_number })?;
    if cell.links.len() > 1 {
        debug!("第 {} 行有 {} 个链接，使用第一个", row_number, cell.links.len());
    }

    let label = link.text.trim();
    if label.is_empty() {
        return Err(RowExtractionError::EmptyLabel { row: row_number });
    }

    let source_url = Url::parse(&link.href).map_err(|_| RowExtractionError::InvalidUrl {
        row: row_number,
        href: link.href.clone(),
    })?;

    Ok(DocumentDescriptor::new(source_url, label))
}
