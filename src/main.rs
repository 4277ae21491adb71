//! Tripflow API 服务
//!
//! 启动: cargo run
//! POST /plan 规划行程；POST /plan/stream 为 SSE 进度流

use std::sync::Arc;

use tripflow::config::{load_config, AppConfig};
use tripflow::core::create_pipeline;
use tripflow::server::{router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tripflow::observability::init();

    let cfg: AppConfig = load_config(None).unwrap_or_else(|e| {
        tracing::warn!("Config load failed ({}), using defaults", e);
        AppConfig::default()
    });

    let pipeline = create_pipeline(&cfg);
    let state = Arc::new(AppState::new(pipeline));
    let app = router(state);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], cfg.server.port));
    tracing::info!("Tripflow API: http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
