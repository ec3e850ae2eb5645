use powerhex_core::{
    api,
    config::Config,
    detector::{Detector, MockDetector},
    quiz::Quiz,
    scanner::Scanner,
    store::ScanStore,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ----------------------------------------------------------------
    // 0. 日志 & 配置
    // ----------------------------------------------------------------
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("powerhex_core=info".parse()?)
                .add_directive("tower_http=info".parse()?),
        )
        .init();

    let config = Config::from_env()?;
    tracing::info!(
        "⚙️  配置加载完成: Host={}:{}, DB={}, 模拟延迟={}",
        config.host,
        config.port,
        config.db_path,
        config.mock_latency
    );

    // ----------------------------------------------------------------
    // 1. 存储 & 检测器
    // ----------------------------------------------------------------
    if let Some(parent) = std::path::Path::new(&config.db_path).parent() {
        std::fs::create_dir_all(parent)?;
    }
    let store = Arc::new(ScanStore::open(&config.db_path)?);
    tracing::info!("📚 扫描记录库初始化完成");

    let detectors: Vec<Arc<dyn Detector>> = MockDetector::default_pair(config.mock_latency)
        .into_iter()
        .map(|d| Arc::new(d) as Arc<dyn Detector>)
        .collect();
    let scanner = Scanner::new(Arc::clone(&store), detectors)?;
    tracing::info!("🤖 检测器就绪: {:?}", scanner.detector_names());

    // ----------------------------------------------------------------
    // 2. 状态共享容器
    // ----------------------------------------------------------------
    let shared_state = Arc::new(api::AppState {
        store,
        scanner: Arc::new(scanner),
        quiz: Arc::new(Quiz::default()),
        max_upload_bytes: config.max_upload_bytes,
    });

    // ----------------------------------------------------------------
    // 3. 启动 HTTP 服务
    // ----------------------------------------------------------------
    let app = api::app(shared_state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&addr).await?;

    tracing::info!("🚀 API 服务已运行在: http://{}", addr);
    tracing::info!("   - POST /scans?filename=  : 上传图片并扫描");
    tracing::info!("   - POST /scans/{{id}}/flag  : 举报扫描记录");
    tracing::info!("   - GET  /stats            : 仪表盘统计");

    axum::serve(listener, app).await?;

    Ok(())
}
