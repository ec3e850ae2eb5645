use serde::{Deserialize, Serialize};
use std::fmt;

/// 判定阈值：平均置信度严格大于该值 → 疑似伪造
pub const FAKE_THRESHOLD: f64 = 0.8;
/// 判定阈值：平均置信度严格大于该值 → 可疑
pub const SUSPICIOUS_THRESHOLD: f64 = 0.6;

/// 三档结论
///
/// 区间为左开右闭：
/// - `avg <= 0.6`        → [`ScanVerdict::LikelyGenuine`]
/// - `0.6 < avg <= 0.8`  → [`ScanVerdict::Suspicious`]
/// - `avg > 0.8`         → [`ScanVerdict::LikelyFake`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScanVerdict {
    LikelyGenuine,
    Suspicious,
    LikelyFake,
}

impl ScanVerdict {
    pub const ALL: [ScanVerdict; 3] = [Self::LikelyGenuine, Self::Suspicious, Self::LikelyFake];

    /// 由平均置信度得出结论（纯函数，全定义域）
    ///
    /// NaN 与任何数比较都为 false，因此落入 `LikelyGenuine`。
    pub fn from_confidence(avg: f64) -> Self {
        if avg > FAKE_THRESHOLD {
            Self::LikelyFake
        } else if avg > SUSPICIOUS_THRESHOLD {
            Self::Suspicious
        } else {
            Self::LikelyGenuine
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LikelyGenuine => "LIKELY_GENUINE",
            Self::Suspicious => "SUSPICIOUS",
            Self::LikelyFake => "LIKELY_FAKE",
        }
    }
}

impl fmt::Display for ScanVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 两路检测器合并：取平均后按阈值分档
pub fn classify(c1: f64, c2: f64) -> ScanVerdict {
    ScanVerdict::from_confidence((c1 + c2) / 2.0)
}

/// N 路检测器的平均置信度，空输入返回 `None`
pub fn mean_confidence(scores: &[f64]) -> Option<f64> {
    if scores.is_empty() {
        return None;
    }
    Some(scores.iter().sum::<f64>() / scores.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boundaries_are_half_open() {
        assert_eq!(classify(0.6, 0.6), ScanVerdict::LikelyGenuine);
        assert_eq!(classify(0.6, 0.601), ScanVerdict::Suspicious);
        assert_eq!(classify(0.8, 0.8), ScanVerdict::Suspicious);
        assert_eq!(classify(0.801, 0.801), ScanVerdict::LikelyFake);
    }

    #[test]
    fn extremes() {
        assert_eq!(classify(0.0, 0.0), ScanVerdict::LikelyGenuine);
        assert_eq!(classify(1.0, 1.0), ScanVerdict::LikelyFake);
        assert_eq!(classify(1.0, 0.0), ScanVerdict::LikelyGenuine);
    }

    #[test]
    fn depends_only_on_average() {
        // 0.9 + 0.5 与 0.7 + 0.7 平均值都是 0.7
        assert_eq!(classify(0.9, 0.5), classify(0.7, 0.7));
        assert_eq!(classify(0.9, 0.5), classify(0.5, 0.9));
        assert_eq!(classify(0.2, 0.6), ScanVerdict::from_confidence(0.4));
    }

    #[test]
    fn grid_always_yields_a_verdict_matching_its_interval() {
        for i in 0..=20 {
            for j in 0..=20 {
                let (c1, c2) = (i as f64 / 20.0, j as f64 / 20.0);
                let avg = (c1 + c2) / 2.0;
                let expected = if avg > 0.8 {
                    ScanVerdict::LikelyFake
                } else if avg > 0.6 {
                    ScanVerdict::Suspicious
                } else {
                    ScanVerdict::LikelyGenuine
                };
                assert_eq!(classify(c1, c2), expected, "c1={c1} c2={c2}");
            }
        }
    }

    #[test]
    fn mean_of_two_matches_classifier_average() {
        assert_eq!(mean_confidence(&[]), None);
        assert_eq!(mean_confidence(&[0.25, 0.75]), Some(0.5));
        assert_eq!(mean_confidence(&[0.4]), Some(0.4));
    }

    #[test]
    fn serializes_as_screaming_snake_case() {
        let json = serde_json::to_string(&ScanVerdict::LikelyFake).unwrap();
        assert_eq!(json, "\"LIKELY_FAKE\"");
        let back: ScanVerdict = serde_json::from_str("\"SUSPICIOUS\"").unwrap();
        assert_eq!(back, ScanVerdict::Suspicious);
        assert_eq!(ScanVerdict::LikelyGenuine.to_string(), "LIKELY_GENUINE");
    }
}
