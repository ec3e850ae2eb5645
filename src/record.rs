use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::verdict::ScanVerdict;

/// 图片技术元数据（尺寸、色彩模式、格式、pHash ...），作为一个整体存进记录
pub type Metadata = BTreeMap<String, serde_json::Value>;

/// 扫描记录 (Scan Record)
///
/// 创建后只有 `(flagged, flag_reason)` 这一对字段允许修改，
/// 而且只能通过 [`ScanRecord::flag`] / [`ScanRecord::unflag`] 成对修改，
/// 保证 `flagged == flag_reason.is_some()`。
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ScanRecord {
    /// 单调递增的 ID（sled generate_id）
    pub id: u64,

    /// 上传时的原始文件名。只作展示，不当作路径使用
    pub filename: String,

    /// 原始字节的 SHA256（Hex），用于去重 / 检索，不要求唯一
    pub file_hash: String,

    pub scan_result: ScanVerdict,

    /// 各检测器置信度的平均值，[0, 1]
    pub confidence_score: f64,

    pub timestamp: DateTime<Utc>,

    pub metadata: Metadata,

    pub flagged: bool,
    pub flag_reason: Option<String>,
}

impl ScanRecord {
    pub(crate) fn flag(&mut self, reason: String) {
        self.flagged = true;
        self.flag_reason = Some(reason);
    }

    pub(crate) fn unflag(&mut self) {
        self.flagged = false;
        self.flag_reason = None;
    }

    /// 标记字段是否自洽
    pub fn flag_invariant_holds(&self) -> bool {
        self.flagged == self.flag_reason.is_some()
    }
}

/// `create_scan` 的入参，ID / 时间戳 / 标记状态由存储层分配
#[derive(Debug, Clone)]
pub struct NewScan {
    pub filename: String,
    pub file_hash: String,
    pub result: ScanVerdict,
    pub confidence: f64,
    pub metadata: Metadata,
}

/// 测验记录，一次提交写一条，之后不再修改
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct QuizAttempt {
    pub id: u64,
    pub score: u32,
    /// 提交时题库的题目数
    pub total: u32,
    pub timestamp: DateTime<Utc>,
}
