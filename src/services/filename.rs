//! 输出文件名
//!
//! 文件名 = 清理后的 label + `.pdf`。期末日期一般形如 `15/07/2024`，
//! 斜杠在 zip 里会变成目录，所以替换成 `-`。

use std::collections::HashSet;

use tracing::warn;

use crate::config::DuplicatePolicy;
use crate::error::{AppError, AppResult};
use crate::models::DocumentDescriptor;

const MAX_STEM_CHARS: usize = 120;

/// 把 label 转成安全的文件名主干
pub fn sanitize_stem(label: &str) -> String {
    let cleaned: String = label
        .chars()
        .map(|c| if is_forbidden(c) { '-' } else { c })
        .collect();
    let trimmed = cleaned.trim_matches(|c: char| c == '.' || c.is_whitespace());
    let mut stem: String = trimmed.chars().take(MAX_STEM_CHARS).collect();
    if stem.is_empty() {
        stem = "payslip".to_string();
    }
    stem
}

fn is_forbidden(c: char) -> bool {
    matches!(c, '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '\0'..='\u{1F}')
}

/// 为每个文档分配唯一的文件名（与输入顺序一一对应）
///
/// 重复时按策略处理：追加 ` (2)`、` (3)`…… 或直接报错
pub fn assign_filenames(
    descriptors: &[DocumentDescriptor],
    policy: DuplicatePolicy,
) -> AppResult<Vec<String>> {
    let mut used: HashSet<String> = HashSet::new();
    let mut names = Vec::with_capacity(descriptors.len());

    for descriptor in descriptors {
        let stem = sanitize_stem(&descriptor.label);
        let mut name = format!("{}.pdf", stem);

        if used.contains(&name.to_lowercase()) {
            if policy == DuplicatePolicy::Fail {
                return Err(AppError::ArchiveAssembly(format!(
                    "文件名重复: {} (label '{}')",
                    name, descriptor.label
                )));
            }
            let mut suffix = 2;
            while used.contains(&name.to_lowercase()) {
                name = format!("{} ({}).pdf", stem, suffix);
                suffix += 1;
            }
            warn!("⚠️ 文件名重复，{} 改名为 {}", descriptor.label, name);
        }

        used.insert(name.to_lowercase());
        names.push(name);
    }

    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn descriptor(label: &str) -> DocumentDescriptor {
        DocumentDescriptor::new(Url::parse("https://portal.test/x").unwrap(), label)
    }

    #[test]
    fn dates_become_flat_filenames() {
        assert_eq!(sanitize_stem("15/07/2024"), "15-07-2024");
        assert_eq!(sanitize_stem("  a:b?  "), "a-b-");
        assert_eq!(sanitize_stem("..."), "payslip");
    }

    #[test]
    fn unique_labels_keep_their_names() {
        let names = assign_filenames(
            &[descriptor("a"), descriptor("b")],
            DuplicatePolicy::Fail,
        )
        .unwrap();
        assert_eq!(names, ["a.pdf", "b.pdf"]);
    }

    #[test]
    fn duplicates_are_disambiguated_in_order() {
        let names = assign_filenames(
            &[
                descriptor("30/06/2024"),
                descriptor("30/06/2024"),
                descriptor("x"),
                descriptor("30/06/2024"),
            ],
            DuplicatePolicy::Disambiguate,
        )
        .unwrap();
        assert_eq!(
            names,
            [
                "30-06-2024.pdf",
                "30-06-2024 (2).pdf",
                "x.pdf",
                "30-06-2024 (3).pdf"
            ]
        );
    }

    #[test]
    fn disambiguation_skips_names_already_taken() {
        let names = assign_filenames(
            &[descriptor("a"), descriptor("a (2)"), descriptor("a")],
            DuplicatePolicy::Disambiguate,
        )
        .unwrap();
        assert_eq!(names, ["a.pdf", "a (2).pdf", "a (3).pdf"]);
    }

    #[test]
    fn duplicates_fail_fast_when_configured() {
        let err = assign_filenames(&[descriptor("a"), descriptor("A")], DuplicatePolicy::Fail)
            .unwrap_err();
        assert!(matches!(err, AppError::ArchiveAssembly(_)));
    }
}
