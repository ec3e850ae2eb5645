//! 统一错误类型
//!
//! 库内部全部返回 [`Result<T>`]；二进制入口 (`main.rs`) 和检测器实现仍然使用 `anyhow`。

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// 目标扫描记录不存在 (flag / resolve / 查询)
    #[error("scan record not found (id={0})")]
    NotFound(u64),

    /// 置信度必须是 [0,1] 内的有限数
    #[error("confidence {0} is outside [0, 1]")]
    InvalidConfidence(f64),

    /// 入库的判定结果与分类器对该置信度的结论不一致
    #[error("verdict {given} does not match confidence {confidence} (expected {expected})")]
    VerdictMismatch {
        given: crate::verdict::ScanVerdict,
        expected: crate::verdict::ScanVerdict,
        confidence: f64,
    },

    #[error("uploaded file is empty")]
    EmptyUpload,

    #[error("unsupported file type: {0} (expected png, jpg or jpeg)")]
    UnsupportedFileType(String),

    #[error("scanner needs at least one detector")]
    NoDetectors,

    /// 任何一个检测器失败，整次扫描中止，不落库
    #[error("detector '{name}' failed: {source}")]
    Detector {
        name: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("invalid quiz submission: {0}")]
    InvalidQuiz(String),

    #[error("storage error: {0}")]
    Storage(#[from] sled::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// spawn_blocking / JoinSet 任务异常退出
    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, Error>;
