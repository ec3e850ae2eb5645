use anyhow::Context;
use std::env;

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: String,
    /// 单次上传的字节上限
    pub max_upload_bytes: usize,
    /// 模拟检测器是否 sleep（演示用，测试/压测时关掉）
    pub mock_latency: bool,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// 通过任意 key → value 查找函数构建配置，便于测试时不污染进程环境变量
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let port = match lookup("PORT") {
            Some(raw) => raw
                .parse()
                .with_context(|| format!("PORT must be a number, got {:?}", raw))?,
            None => 3000,
        };
        let max_upload_bytes = match lookup("MAX_UPLOAD_BYTES") {
            Some(raw) => raw
                .parse()
                .with_context(|| format!("MAX_UPLOAD_BYTES must be a number, got {:?}", raw))?,
            None => 10 * 1024 * 1024,
        };
        let mock_latency = match lookup("MOCK_LATENCY").as_deref() {
            None => true,
            Some("1" | "true" | "yes" | "on") => true,
            Some("0" | "false" | "no" | "off") => false,
            Some(other) => anyhow::bail!("MOCK_LATENCY must be a boolean, got {:?}", other),
        };

        Ok(Self {
            host: lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port,
            db_path: lookup("DB_PATH").unwrap_or_else(|| "data/db/powerhex_db".to_string()),
            max_upload_bytes,
            mock_latency,
        })
    }
}
