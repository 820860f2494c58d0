//! 员工身份信息解析
//!
//! 详情面板中的文字格式：`<员工号> <姓>, <名> <中间名...>`

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmployeeIdentity {
    pub employee_id: String,
    pub last_name: String,
    pub first_name: String,
    pub middle_names: Vec<String>,
}

const IDENTITY_PATTERN: &str =
    r"^(?P<id>[A-Za-z0-9_-]+)\s+(?P<last>[^,]+?)\s*,\s*(?P<first>\S+)(?:\s+(?P<middle>.+))?$";

static IDENTITY_RE: Lazy<Result<Regex, regex::Error>> = Lazy::new(|| Regex::new(IDENTITY_PATTERN));

impl EmployeeIdentity {
    /// 解析详情文字，格式不对时返回 `NavigationPrecondition`
    pub fn parse(text: &str) -> AppResult<Self> {
        let trimmed = text.trim();
        let re = IDENTITY_RE
            .as_ref()
            .map_err(|e| AppError::NavigationPrecondition(format!("员工信息正则无效: {}", e)))?;
        let caps = re.captures(trimmed).ok_or_else(|| {
            AppError::NavigationPrecondition(format!("无法从员工信息中解析员工号: '{}'", trimmed))
        })?;

        let middle_names = caps
            .name("middle")
            .map(|m| m.as_str().split_whitespace().map(str::to_string).collect())
            .unwrap_or_default();

        Ok(Self {
            employee_id: caps["id"].to_string(),
            last_name: caps["last"].to_string(),
            first_name: caps["first"].to_string(),
            middle_names,
        })
    }
}
