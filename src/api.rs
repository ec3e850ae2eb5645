use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    error::Error,
    flagging::{self, Report},
    quiz::{Question, Quiz, QuizOutcome},
    record::{QuizAttempt, ScanRecord},
    scanner::{ScanReport, Scanner},
    store::{QuizStats, ScanFilter, ScanStats, ScanStore},
};

// ==========================================
// 1. 应用状态 (Shared State)
// ==========================================
// sled 自带并发控制，这里不再包 Mutex；单条记录的写在存储层用 CAS 串行化。
pub struct AppState {
    pub store: Arc<ScanStore>,
    pub scanner: Arc<Scanner>,
    pub quiz: Arc<Quiz>,
    pub max_upload_bytes: usize,
}

type ApiResult<T> = Result<Json<T>, (StatusCode, String)>;

// ==========================================
// 2. 数据传输对象 (DTOs)
// ==========================================

#[derive(Deserialize)]
pub struct UploadQuery {
    pub filename: String,
}

#[derive(Deserialize)]
pub struct ListQuery {
    pub flagged: Option<bool>,
    /// 按 SHA256 检索
    pub hash: Option<String>,
}

#[derive(Deserialize)]
pub struct QuizSubmission {
    pub answers: Vec<usize>,
}

#[derive(Serialize)]
pub struct QuizReceipt {
    pub attempt: QuizAttempt,
    pub outcome: QuizOutcome,
}

#[derive(Serialize)]
pub struct Health {
    pub status: &'static str,
    pub detectors: Vec<String>,
}

// ==========================================
// 3. 路由
// ==========================================
pub fn app(state: Arc<AppState>) -> Router {
    let body_limit = state.max_upload_bytes;
    Router::new()
        .route("/health", get(health))
        .route("/scans", post(submit_scan).get(list_scans))
        .route("/scans/{id}", get(get_scan))
        .route("/scans/{id}/flag", post(report_scan).delete(resolve_scan))
        .route("/stats", get(stats))
        .route("/quiz", get(quiz_questions).post(submit_quiz))
        .route("/quiz/stats", get(quiz_stats))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()) // ⚠️ 开发模式：允许所有跨域
        .with_state(state)
}

/// 领域错误 → HTTP 状态码
fn reject(e: Error) -> (StatusCode, String) {
    let status = match &e {
        Error::NotFound(_) => StatusCode::NOT_FOUND,
        Error::EmptyUpload
        | Error::InvalidQuiz(_)
        | Error::InvalidConfidence(_)
        | Error::VerdictMismatch { .. } => StatusCode::BAD_REQUEST,
        Error::UnsupportedFileType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
        Error::Detector { .. } => StatusCode::BAD_GATEWAY,
        Error::NoDetectors | Error::Storage(_) | Error::Serialization(_) | Error::Task(_) => {
            tracing::error!("内部错误: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (status, e.to_string())
}

// ==========================================
// 4. 处理函数 (Handlers)
// ==========================================

async fn health(State(state): State<Arc<AppState>>) -> Json<Health> {
    Json(Health {
        status: "ok",
        detectors: state
            .scanner
            .detector_names()
            .into_iter()
            .map(String::from)
            .collect(),
    })
}

/// 接口：上传图片并扫描。请求体是原始图片字节，文件名走 query
async fn submit_scan(
    State(state): State<Arc<AppState>>,
    Query(query): Query<UploadQuery>,
    body: Bytes,
) -> ApiResult<ScanReport> {
    tracing::info!("📥 收到扫描请求: 文件={}, 大小={}", query.filename, body.len());
    let report = state
        .scanner
        .scan(&query.filename, body.to_vec())
        .await
        .map_err(reject)?;
    Ok(Json(report))
}

async fn list_scans(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Vec<ScanRecord>> {
    let filter = ScanFilter::from(query.flagged);
    let records = match query.hash {
        Some(hash) => state
            .store
            .find_by_hash(&hash)
            .map_err(reject)?
            .into_iter()
            .filter(|r| filter.matches(r))
            .collect(),
        None => state.store.list_scans(filter).map_err(reject)?,
    };
    Ok(Json(records))
}

async fn get_scan(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> ApiResult<ScanRecord> {
    state.store.get_scan(id).map(Json).map_err(reject)
}

/// 接口：举报
async fn report_scan(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
    Json(report): Json<Report>,
) -> ApiResult<ScanRecord> {
    flagging::report(&state.store, id, &report)
        .map(Json)
        .map_err(reject)
}

/// 接口：处理举报
async fn resolve_scan(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> ApiResult<ScanRecord> {
    flagging::resolve(&state.store, id).map(Json).map_err(reject)
}

async fn stats(State(state): State<Arc<AppState>>) -> ApiResult<ScanStats> {
    state.store.aggregate().map(Json).map_err(reject)
}

async fn quiz_questions(State(state): State<Arc<AppState>>) -> Json<Vec<Question>> {
    Json(state.quiz.questions().to_vec())
}

async fn submit_quiz(
    State(state): State<Arc<AppState>>,
    Json(submission): Json<QuizSubmission>,
) -> ApiResult<QuizReceipt> {
    let outcome = state.quiz.grade(&submission.answers).map_err(reject)?;
    let attempt = state
        .store
        .record_quiz_attempt(outcome.score, outcome.total)
        .map_err(reject)?;
    tracing::info!("🎓 测验提交: 得分 {}/{}", outcome.score, outcome.total);
    Ok(Json(QuizReceipt { attempt, outcome }))
}

async fn quiz_stats(State(state): State<Arc<AppState>>) -> ApiResult<QuizStats> {
    state.store.quiz_stats().map(Json).map_err(reject)
}
