//! 检测器能力边界
//!
//! 核心只依赖 [`Detector`] 这个 trait：输入图片字节，输出置信度 + 判定 + 明细。
//! 仓库自带的 [`MockDetector`] 只是占位实现（随机置信度 + 人为延迟），
//! 接真实模型时换成网络实现即可，分类器和存储层都不用动。

use async_trait::async_trait;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 单个检测器的一次输出
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Detection {
    pub detector: String,
    pub confidence: f64,
    pub is_fake: bool,
    pub details: serde_json::Map<String, serde_json::Value>,
}

#[async_trait]
pub trait Detector: Send + Sync {
    /// 检测器名称，用于日志与结果展示
    fn name(&self) -> &str;

    /// 对一张图片给出判定。每次调用相互独立，对核心没有副作用。
    async fn detect(&self, image: &[u8]) -> anyhow::Result<Detection>;
}

#[derive(Debug, Clone, Copy)]
enum MockProfile {
    Deepware,
    FaceForensics,
}

/// 模拟检测器：均匀分布的随机置信度
#[derive(Debug, Clone)]
pub struct MockDetector {
    name: String,
    profile: MockProfile,
    /// 置信度采样区间 [low, high)
    range: (f64, f64),
    /// 置信度严格大于该值判为伪造
    fake_threshold: f64,
    /// 模拟网络延迟
    latency: Duration,
}

impl MockDetector {
    pub fn deepware(latency: Duration) -> Self {
        Self {
            name: "Deepware API".to_string(),
            profile: MockProfile::Deepware,
            range: (0.15, 0.95),
            fake_threshold: 0.6,
            latency,
        }
    }

    pub fn faceforensics(latency: Duration) -> Self {
        Self {
            name: "FaceForensics++".to_string(),
            profile: MockProfile::FaceForensics,
            range: (0.2, 0.9),
            fake_threshold: 0.55,
            latency,
        }
    }

    /// 默认的两路检测器；`with_latency = false` 时不 sleep
    pub fn default_pair(with_latency: bool) -> Vec<Self> {
        let (dw, ff) = if with_latency {
            (Duration::from_millis(2000), Duration::from_millis(1500))
        } else {
            (Duration::ZERO, Duration::ZERO)
        };
        vec![Self::deepware(dw), Self::faceforensics(ff)]
    }
}

#[async_trait]
impl Detector for MockDetector {
    fn name(&self) -> &str {
        &self.name
    }

    async fn detect(&self, _image: &[u8]) -> anyhow::Result<Detection> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        // ThreadRng 不是 Send，不能跨 await 持有，所以放在 sleep 之后一次性用完
        let mut rng = rand::thread_rng();
        let confidence = rng.gen_range(self.range.0..self.range.1);
        let is_fake = confidence > self.fake_threshold;

        let mut details = serde_json::Map::new();
        match self.profile {
            MockProfile::Deepware => {
                details.insert("face_detected".into(), true.into());
                details.insert(
                    "manipulation_type".into(),
                    if is_fake { "deepfake" } else { "none" }.into(),
                );
                details.insert(
                    "processing_time".into(),
                    format!("{:.1}s", self.latency.as_secs_f64()).into(),
                );
            }
            MockProfile::FaceForensics => {
                details.insert("compression_artifacts".into(), rng.gen_bool(0.5).into());
                details.insert(
                    "temporal_consistency".into(),
                    if rng.gen_bool(0.5) { "consistent" } else { "inconsistent" }.into(),
                );
                details.insert("neural_network_traces".into(), is_fake.into());
            }
        }

        Ok(Detection {
            detector: self.name.clone(),
            confidence,
            is_fake,
            details,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn deepware_stays_in_range_and_is_consistent() {
        let detector = MockDetector::deepware(Duration::ZERO);
        for _ in 0..200 {
            let d = detector.detect(b"img").await.unwrap();
            assert!((0.15..0.95).contains(&d.confidence));
            assert_eq!(d.is_fake, d.confidence > 0.6);
            assert_eq!(d.detector, "Deepware API");
            let expected = if d.is_fake { "deepfake" } else { "none" };
            assert_eq!(d.details["manipulation_type"], expected);
        }
    }

    #[tokio::test]
    async fn faceforensics_stays_in_range_and_is_consistent() {
        let detector = MockDetector::faceforensics(Duration::ZERO);
        for _ in 0..200 {
            let d = detector.detect(b"img").await.unwrap();
            assert!((0.2..0.9).contains(&d.confidence));
            assert_eq!(d.is_fake, d.confidence > 0.55);
            assert_eq!(d.details["neural_network_traces"], d.is_fake);
        }
    }

    #[tokio::test]
    async fn latency_is_simulated() {
        let detector = MockDetector::deepware(Duration::from_millis(30));
        let started = std::time::Instant::now();
        let d = detector.detect(b"img").await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(30));
        assert_eq!(d.details["processing_time"], "0.0s");
    }

    #[test]
    fn default_pair_names() {
        let pair = MockDetector::default_pair(false);
        let names: Vec<_> = pair.iter().map(|d| d.name().to_string()).collect();
        assert_eq!(names, ["Deepware API", "FaceForensics++"]);
    }
}
