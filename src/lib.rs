//! 图片鉴伪扫描服务核心
//!
//! 上传图片 → 检测器打分 → 分类 → 落库，外加举报流程、科普测验和仪表盘聚合。

pub mod api;
pub mod config;
pub mod detector;
pub mod error;
pub mod fingerprint;
pub mod flagging;
pub mod quiz;
pub mod record;
pub mod scanner;
pub mod store;
pub mod verdict;

pub use error::{Error, Result};
