use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tokio::task::JoinSet;

use crate::detector::{Detection, Detector};
use crate::error::{Error, Result};
use crate::fingerprint;
use crate::record::{NewScan, ScanRecord};
use crate::store::ScanStore;
use crate::verdict::{mean_confidence, ScanVerdict};

/// 允许上传的扩展名（不区分大小写）
pub const ALLOWED_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

/// 一次扫描的完整回执：落库的记录 + 各检测器原始输出
#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    pub record: ScanRecord,
    pub detections: Vec<Detection>,
}

/// 扫描流水线
///
/// 上传校验 → 哈希 & 元数据 → 检测器 → 分类 → 落库。
/// 任一检测器失败则整次扫描中止，不写任何记录。
pub struct Scanner {
    store: Arc<ScanStore>,
    detectors: Vec<Arc<dyn Detector>>,
}

impl Scanner {
    pub fn new(store: Arc<ScanStore>, detectors: Vec<Arc<dyn Detector>>) -> Result<Self> {
        if detectors.is_empty() {
            return Err(Error::NoDetectors);
        }
        Ok(Self { store, detectors })
    }

    pub fn store(&self) -> &Arc<ScanStore> {
        &self.store
    }

    pub fn detector_names(&self) -> Vec<&str> {
        self.detectors.iter().map(|d| d.name()).collect()
    }

    pub async fn scan(&self, filename: &str, bytes: Vec<u8>) -> Result<ScanReport> {
        if bytes.is_empty() {
            return Err(Error::EmptyUpload);
        }
        check_extension(filename)?;

        tracing::info!("🔍 开始扫描: {} ({} bytes)", filename, bytes.len());
        let image: Arc<[u8]> = bytes.into();

        // 解码 + pHash 是 CPU 密集型操作，挪到 blocking 线程池
        let blob = Arc::clone(&image);
        let (file_hash, metadata) = tokio::task::spawn_blocking(move || {
            (fingerprint::file_hash(&blob), fingerprint::extract_metadata(&blob))
        })
        .await?;

        // 检测器全部成功才继续；任何一个失败都不落库
        let detections = self.run_detectors(image).await?;

        // 多路平均 → 结论
        let scores: Vec<f64> = detections.iter().map(|d| d.confidence).collect();
        let confidence = mean_confidence(&scores).ok_or(Error::NoDetectors)?;
        let result = ScanVerdict::from_confidence(confidence);

        let id = self.store.create_scan(NewScan {
            filename: filename.to_string(),
            file_hash,
            result,
            confidence,
            metadata,
        })?;
        let record = self.store.get_scan(id)?;

        tracing::info!(
            "✅ 扫描完成: id={}, 结论={}, 置信度={:.2}",
            id,
            result,
            confidence
        );
        Ok(ScanReport { record, detections })
    }

    /// 所有检测器并发执行，结果按注册顺序返回
    async fn run_detectors(&self, image: Arc<[u8]>) -> Result<Vec<Detection>> {
        // 1. 每个检测器一个任务，带上注册序号
        let mut set = JoinSet::new();
        for (idx, detector) in self.detectors.iter().enumerate() {
            let detector = Arc::clone(detector);
            let image = Arc::clone(&image);
            set.spawn(async move {
                let name = detector.name().to_string();
                let outcome = detector.detect(&image).await.and_then(validate);
                (idx, name, outcome)
            });
        }

        // 2. 按完成顺序收集，放回各自的槽位
        let mut slots: Vec<Option<Detection>> = vec![None; self.detectors.len()];
        while let Some(joined) = set.join_next().await {
            let (idx, name, outcome) = joined?;
            match outcome {
                Ok(detection) => {
                    tracing::debug!(detector = %name, confidence = detection.confidence, "检测完成");
                    slots[idx] = Some(detection);
                }
                Err(source) => {
                    // 提前返回时 JoinSet 被 drop，其余检测任务随之取消
                    tracing::warn!("❌ 检测器 {} 失败，扫描中止: {}", name, source);
                    return Err(Error::Detector { name, source });
                }
            }
        }
        // 3. 走到这里说明全部成功，槽位已填满
        Ok(slots.into_iter().flatten().collect())
    }
}

fn validate(detection: Detection) -> anyhow::Result<Detection> {
    let c = detection.confidence;
    if !c.is_finite() || !(0.0..=1.0).contains(&c) {
        anyhow::bail!("confidence {} is outside [0, 1]", c);
    }
    Ok(detection)
}

fn check_extension(filename: &str) -> Result<()> {
    let ext = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext {
        Some(ext) if ALLOWED_EXTENSIONS.contains(&ext.as_str()) => Ok(()),
        _ => Err(Error::UnsupportedFileType(filename.to_string())),
    }
}
