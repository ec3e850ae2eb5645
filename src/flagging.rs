//! 社区举报流程
//!
//! 每条记录只有两个状态：`Unflagged`（初始）与 `Flagged{reason}`。
//! - 举报 (report): Unflagged → Flagged；对已举报记录再次举报会覆盖原因
//! - 处理 (resolve): Flagged → Unflagged，原因一并清空；对未举报记录是空操作

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::Result;
use crate::record::ScanRecord;
use crate::store::ScanStore;

/// 举报原因分类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportReason {
    SuspectedDeepfake,
    IdentityTheft,
    Misinformation,
    InappropriateContent,
    Other,
}

impl ReportReason {
    pub fn label(&self) -> &'static str {
        match self {
            Self::SuspectedDeepfake => "Suspected deepfake",
            Self::IdentityTheft => "Identity theft",
            Self::Misinformation => "Misinformation",
            Self::InappropriateContent => "Inappropriate content",
            Self::Other => "Other",
        }
    }
}

impl fmt::Display for ReportReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// 一次举报：分类 + 可选补充说明
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    pub reason: ReportReason,
    #[serde(default)]
    pub details: Option<String>,
}

impl Report {
    /// 落库的原因字符串：`"分类"` 或 `"分类: 补充说明"`
    pub fn flag_reason(&self) -> String {
        match self.details.as_deref().map(str::trim) {
            Some(details) if !details.is_empty() => format!("{}: {}", self.reason, details),
            _ => self.reason.to_string(),
        }
    }
}

/// 记录当前所处状态
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlagState<'a> {
    Unflagged,
    Flagged { reason: &'a str },
}

impl ScanRecord {
    pub fn flag_state(&self) -> FlagState<'_> {
        match (self.flagged, self.flag_reason.as_deref()) {
            (true, Some(reason)) => FlagState::Flagged { reason },
            _ => FlagState::Unflagged,
        }
    }
}

pub fn report(store: &ScanStore, id: u64, report: &Report) -> Result<ScanRecord> {
    let reason = report.flag_reason();
    let record = store.set_flag(id, reason.as_str())?;
    tracing::info!("🚩 记录 {} 被举报: {}", id, reason);
    Ok(record)
}

pub fn resolve(store: &ScanStore, id: u64) -> Result<ScanRecord> {
    let record = store.clear_flag(id)?;
    tracing::info!("✅ 记录 {} 的举报已处理", id);
    Ok(record)
}
