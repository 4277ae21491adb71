//! HTTP 边界层
//!
//! 请求校验与响应组装；流水线本身的阶段失败不在这里报错（状态里的 error 字段
//! 随响应透出），只有请求校验失败与意外错误以 HTTP 错误码返回。
//! /plan/stream 通过 SSE 推送阶段进度：started -> stage_started/stage_completed
//! 每阶段一对 -> 终态 completed 或 error。

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    routing::{get, post},
    Json, Router,
};
use futures_util::stream;
use serde::Serialize;
use serde_json::json;
use tokio::sync::mpsc;

use crate::core::{Itinerary, PipelineEvent, TripPipeline, TripRequest};

/// 共享应用状态：可多请求并发使用的流水线
pub struct AppState {
    pipeline: Arc<TripPipeline>,
}

impl AppState {
    pub fn new(pipeline: TripPipeline) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
        }
    }
}

/// 行程规划响应
#[derive(Debug, Serialize)]
pub struct TripResponse {
    pub request_id: String,
    pub status: String,
    pub itinerary: Option<Itinerary>,
    pub error: Option<String>,
}

/// SSE 终态事件
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum TerminalEvent {
    Completed { itinerary: Itinerary },
    Error { message: String },
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/plan", post(plan_trip))
        .route("/plan/stream", post(plan_trip_stream))
        .with_state(state)
}

/// 每请求生成的不透明标识
fn new_request_id() -> String {
    let hex = uuid::Uuid::new_v4().simple().to_string();
    format!("trip_{}", &hex[..8])
}

async fn root() -> Json<serde_json::Value> {
    Json(json!({
        "message": "Tripflow API",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running",
    }))
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

/// POST /plan：校验请求、执行流水线、返回完整行程
async fn plan_trip(
    State(state): State<Arc<AppState>>,
    Json(request): Json<TripRequest>,
) -> Result<Json<TripResponse>, (StatusCode, String)> {
    let request_id = new_request_id();
    tracing::info!(%request_id, destination = %request.destination, "received plan request");

    let request = request
        .validated()
        .map_err(|e| (StatusCode::UNPROCESSABLE_ENTITY, e.to_string()))?;

    let final_state = state.pipeline.execute(request, None).await;

    tracing::info!(%request_id, "plan request completed");
    Ok(Json(TripResponse {
        request_id,
        status: "completed".to_string(),
        itinerary: final_state.itinerary,
        error: final_state.error,
    }))
}

/// POST /plan/stream：SSE 推送阶段进度与终态结果
async fn plan_trip_stream(
    State(state): State<Arc<AppState>>,
    Json(request): Json<TripRequest>,
) -> Result<Sse<impl futures_util::Stream<Item = Result<Event, Infallible>>>, (StatusCode, String)>
{
    let request_id = new_request_id();
    tracing::info!(%request_id, destination = %request.destination, "received streaming plan request");

    let request = request
        .validated()
        .map_err(|e| (StatusCode::UNPROCESSABLE_ENTITY, e.to_string()))?;

    // 事件通道携带已序列化的 JSON；流水线进度经 forwarder 转发，终态在其后发送
    let (tx, rx) = mpsc::unbounded_channel::<String>();
    let pipeline = Arc::clone(&state.pipeline);

    tokio::spawn(async move {
        let _ = tx.send(json!({"status": "started", "agent": "researcher"}).to_string());

        let (ptx, mut prx) = mpsc::unbounded_channel::<PipelineEvent>();
        let forward_tx = tx.clone();
        let forwarder = tokio::spawn(async move {
            while let Some(ev) = prx.recv().await {
                if let Ok(payload) = serde_json::to_string(&ev) {
                    let _ = forward_tx.send(payload);
                }
            }
        });

        let final_state = pipeline.execute(request, Some(&ptx)).await;
        drop(ptx);
        // 等 forwarder 清空通道，保证终态事件最后到达
        let _ = forwarder.await;

        let terminal = match final_state.itinerary {
            Some(itinerary) => TerminalEvent::Completed { itinerary },
            None => TerminalEvent::Error {
                message: final_state
                    .error
                    .unwrap_or_else(|| "itinerary generation failed".to_string()),
            },
        };
        if let Ok(payload) = serde_json::to_string(&terminal) {
            let _ = tx.send(payload);
        }
        tracing::info!(%request_id, "streaming plan request completed");
    });

    let event_stream = stream::unfold(rx, |mut rx| async move {
        rx.recv()
            .await
            .map(|msg| (Ok(Event::default().data(msg)), rx))
    });
    Ok(Sse::new(event_stream).keep_alive(
        KeepAlive::new()
            .interval(std::time::Duration::from_secs(15))
            .text("keepalive"),
    ))
}
