use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{Error, Result};
use crate::record::{NewScan, QuizAttempt, ScanRecord};
use crate::verdict::ScanVerdict;

/// 直方图分桶数，覆盖 [0, 1]
pub const HISTOGRAM_BINS: usize = 20;
/// 仪表盘里"最近扫描"展示条数
pub const RECENT_SCANS: usize = 10;

const SCANS_TREE: &str = "scans";
const QUIZ_TREE: &str = "quiz_attempts";

/// 列表过滤条件
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ScanFilter {
    #[default]
    All,
    Flagged,
    Unflagged,
}

impl ScanFilter {
    pub fn matches(self, record: &ScanRecord) -> bool {
        match self {
            Self::All => true,
            Self::Flagged => record.flagged,
            Self::Unflagged => !record.flagged,
        }
    }
}

impl From<Option<bool>> for ScanFilter {
    fn from(flagged: Option<bool>) -> Self {
        match flagged {
            None => Self::All,
            Some(true) => Self::Flagged,
            Some(false) => Self::Unflagged,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistogramBin {
    pub lower: f64,
    pub upper: f64,
    pub count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DailyCount {
    pub date: NaiveDate,
    pub count: u64,
}

/// 仪表盘聚合结果
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScanStats {
    pub total: u64,
    pub by_result: BTreeMap<ScanVerdict, u64>,
    pub flagged: u64,
    pub mean_confidence: Option<f64>,
    pub histogram: Vec<HistogramBin>,
    pub daily: Vec<DailyCount>,
    pub recent: Vec<ScanRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuizStats {
    pub attempts: u64,
    pub mean_score: Option<f64>,
}

/// 扫描记录仓库 (Scan Store)
///
/// 底层是一个 sled 数据库，两棵树：
/// - `scans`: key = 大端 u64 ID，value = `ScanRecord` 的 JSON
/// - `quiz_attempts`: key = 大端 u64 ID，value = `QuizAttempt` 的 JSON
///
/// 大端编码保证树的字典序就是 ID 顺序，也就是插入顺序。
/// `sled::Db` 内部线程安全，整个进程共享一个 `Arc<ScanStore>`，不需要外层 Mutex。
pub struct ScanStore {
    db: sled::Db,
    scans: sled::Tree,
    quiz: sled::Tree,
}

impl ScanStore {
    /// 打开（或创建）磁盘上的数据库
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let db = sled::open(path)?;
        Self::from_db(db)
    }

    /// 临时库，进程退出即删除。测试与基准使用
    pub fn temporary() -> Result<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(db)
    }

    fn from_db(db: sled::Db) -> Result<Self> {
        let scans = db.open_tree(SCANS_TREE)?;
        let quiz = db.open_tree(QUIZ_TREE)?;
        Ok(Self { db, scans, quiz })
    }

    // ==========================================
    // 扫描记录
    // ==========================================

    /// 写入一条新的扫描记录，返回 ID
    ///
    /// 写入后立即 flush，I/O 错误直接向上抛，不重试。
    ///
    /// 除存储错误外还会拒绝两类输入，保证落库的每一行都满足结论与置信度的对应关系：
    /// - 置信度不是 [0, 1] 内的有限数：[`Error::InvalidConfidence`]
    /// - `result` 与 [`ScanVerdict::from_confidence`] 不一致：[`Error::VerdictMismatch`]
    ///
    /// 走 [`crate::scanner::Scanner`] 的调用永远不会触发这两个错误。
    pub fn create_scan(&self, new: NewScan) -> Result<u64> {
        if !new.confidence.is_finite() || !(0.0..=1.0).contains(&new.confidence) {
            return Err(Error::InvalidConfidence(new.confidence));
        }
        let expected = ScanVerdict::from_confidence(new.confidence);
        if new.result != expected {
            return Err(Error::VerdictMismatch {
                given: new.result,
                expected,
                confidence: new.confidence,
            });
        }

        let id = self.db.generate_id()?;
        let record = ScanRecord {
            id,
            filename: new.filename,
            file_hash: new.file_hash,
            scan_result: new.result,
            confidence_score: new.confidence,
            timestamp: Utc::now(),
            metadata: new.metadata,
            flagged: false,
            flag_reason: None,
        };

        self.scans.insert(id.to_be_bytes(), serde_json::to_vec(&record)?)?;
        self.scans.flush()?;

        tracing::debug!(id, verdict = %record.scan_result, "扫描记录已写入");
        Ok(id)
    }

    pub fn get_scan(&self, id: u64) -> Result<ScanRecord> {
        let raw = self.scans.get(id.to_be_bytes())?.ok_or(Error::NotFound(id))?;
        Ok(serde_json::from_slice(&raw)?)
    }

    /// 按插入顺序列出记录
    pub fn list_scans(&self, filter: ScanFilter) -> Result<Vec<ScanRecord>> {
        let mut out = Vec::new();
        for item in self.scans.iter() {
            let (_, raw) = item?;
            let record: ScanRecord = serde_json::from_slice(&raw)?;
            if filter.matches(&record) {
                out.push(record);
            }
        }
        Ok(out)
    }

    /// 同一内容可能被扫描多次，全部返回
    pub fn find_by_hash(&self, file_hash: &str) -> Result<Vec<ScanRecord>> {
        Ok(self
            .list_scans(ScanFilter::All)?
            .into_iter()
            .filter(|r| r.file_hash == file_hash)
            .collect())
    }

    /// 标记记录；已标记的记录直接覆盖原因
    pub fn set_flag(&self, id: u64, reason: impl Into<String>) -> Result<ScanRecord> {
        let reason = reason.into();
        self.update_record(id, |record| record.flag(reason.clone()))
    }

    /// 取消标记，同时清空原因
    pub fn clear_flag(&self, id: u64) -> Result<ScanRecord> {
        self.update_record(id, ScanRecord::unflag)
    }

    /// 单条记录的读-改-写
    ///
    /// 用 compare_and_swap 循环实现：并发修改同一条记录时后到者重读重试，
    /// 同一条记录上的写因此是串行的，读不受影响。
    fn update_record<F>(&self, id: u64, mutate: F) -> Result<ScanRecord>
    where
        F: Fn(&mut ScanRecord),
    {
        let key = id.to_be_bytes();
        loop {
            // 1. 读出当前快照，不存在直接 NotFound，不产生任何写
            let current = self.scans.get(key)?.ok_or(Error::NotFound(id))?;

            // 2. 在内存里改
            let mut record: ScanRecord = serde_json::from_slice(&current)?;
            mutate(&mut record);
            let updated = serde_json::to_vec(&record)?;

            // 3. 只有快照没被别人改过才写回
            match self.scans.compare_and_swap(key, Some(current), Some(updated))? {
                Ok(()) => {
                    // 4. 落盘后才算成功
                    self.scans.flush()?;
                    return Ok(record);
                }
                Err(_) => {
                    tracing::trace!(id, "记录被并发修改，重试");
                    continue;
                }
            }
        }
    }

    /// 仪表盘聚合：按结论计数、平均置信度、直方图、按天计数、最近记录
    pub fn aggregate(&self) -> Result<ScanStats> {
        let records = self.list_scans(ScanFilter::All)?;

        let mut by_result: BTreeMap<ScanVerdict, u64> =
            ScanVerdict::ALL.iter().map(|v| (*v, 0)).collect();
        let mut histogram: Vec<HistogramBin> = (0..HISTOGRAM_BINS)
            .map(|i| HistogramBin {
                lower: i as f64 / HISTOGRAM_BINS as f64,
                upper: (i + 1) as f64 / HISTOGRAM_BINS as f64,
                count: 0,
            })
            .collect();
        let mut daily: BTreeMap<NaiveDate, u64> = BTreeMap::new();
        let mut flagged = 0;
        let mut confidence_sum = 0.0;

        for record in &records {
            *by_result.entry(record.scan_result).or_default() += 1;
            if record.flagged {
                flagged += 1;
            }
            confidence_sum += record.confidence_score;
            histogram[histogram_bin(record.confidence_score)].count += 1;
            *daily.entry(record.timestamp.date_naive()).or_default() += 1;
        }

        let total = records.len() as u64;
        let mean_confidence = (total > 0).then(|| confidence_sum / total as f64);
        let recent = records
            .iter()
            .skip(records.len().saturating_sub(RECENT_SCANS))
            .cloned()
            .collect();

        Ok(ScanStats {
            total,
            by_result,
            flagged,
            mean_confidence,
            histogram,
            daily: daily
                .into_iter()
                .map(|(date, count)| DailyCount { date, count })
                .collect(),
            recent,
        })
    }

    // ==========================================
    // 测验记录
    // ==========================================

    pub fn record_quiz_attempt(&self, score: u32, total: u32) -> Result<QuizAttempt> {
        let attempt = QuizAttempt {
            id: self.db.generate_id()?,
            score,
            total,
            timestamp: Utc::now(),
        };
        self.quiz
            .insert(attempt.id.to_be_bytes(), serde_json::to_vec(&attempt)?)?;
        self.quiz.flush()?;
        Ok(attempt)
    }

    pub fn list_quiz_attempts(&self) -> Result<Vec<QuizAttempt>> {
        self.quiz
            .iter()
            .map(|item| -> Result<QuizAttempt> {
                let (_, raw) = item?;
                Ok(serde_json::from_slice(&raw)?)
            })
            .collect()
    }

    pub fn quiz_stats(&self) -> Result<QuizStats> {
        let attempts = self.list_quiz_attempts()?;
        let count = attempts.len() as u64;
        let sum: u64 = attempts.iter().map(|a| u64::from(a.score)).sum();
        Ok(QuizStats {
            attempts: count,
            mean_score: (count > 0).then(|| sum as f64 / count as f64),
        })
    }
}

/// 置信度落在哪个桶；1.0 归入最后一个桶
fn histogram_bin(confidence: f64) -> usize {
    let idx = (confidence * HISTOGRAM_BINS as f64).floor() as usize;
    idx.min(HISTOGRAM_BINS - 1)
}
