//! 流水线构建器：统一的组件初始化逻辑
//!
//! 从配置选择 LLM 后端（无 API Key 时回退 Mock），装配各阶段的工具注册表，
//! 返回可多请求共享的 TripPipeline。

use std::sync::Arc;

use crate::agents::{BudgetStage, PlannerStage, ResearcherStage};
use crate::config::AppConfig;
use crate::core::pipeline::TripPipeline;
use crate::llm::{LlmClient, MockLlmClient, OpenAiClient};
use crate::tools::{
    AttractionSearchTool, CostEstimateTool, DistanceTool, Geocoder, NominatimGeocoder,
    OpenTripMapClient, PlacesApi, ToolRegistry,
};

/// 根据配置创建 LLM 客户端；provider=mock 或无 OPENAI_API_KEY 时用 Mock
pub fn create_llm(cfg: &AppConfig) -> Arc<dyn LlmClient> {
    let provider = cfg.llm.provider.to_lowercase();
    if provider != "mock" && std::env::var("OPENAI_API_KEY").is_ok() {
        tracing::info!(model = %cfg.llm.model, "Using OpenAI-compatible LLM");
        Arc::new(OpenAiClient::new(
            cfg.llm.base_url.as_deref(),
            &cfg.llm.model,
            std::env::var("OPENAI_API_KEY").ok().as_deref(),
            cfg.llm.temperature,
            cfg.llm.max_tokens,
        ))
    } else {
        tracing::warn!("No API key set or provider=mock, using Mock LLM");
        Arc::new(MockLlmClient::new())
    }
}

/// 用生产实现（Nominatim / OpenTripMap）装配流水线
pub fn create_pipeline(cfg: &AppConfig) -> TripPipeline {
    let llm = create_llm(cfg);
    let geocoder: Arc<dyn Geocoder> = Arc::new(NominatimGeocoder::new(
        &cfg.tools.geocode.base_url,
        cfg.tools.geocode.timeout_secs,
    ));
    let api_key = std::env::var(&cfg.tools.places.api_key_env).unwrap_or_else(|_| {
        tracing::warn!(
            env = %cfg.tools.places.api_key_env,
            "places API key not set, attraction search will fail"
        );
        String::new()
    });
    let places: Arc<dyn PlacesApi> = Arc::new(OpenTripMapClient::new(
        &cfg.tools.places.base_url,
        api_key,
        cfg.tools.places.timeout_secs,
    ));
    create_pipeline_with(cfg, llm, geocoder, places)
}

/// 用外部注入的能力实现装配流水线（测试用同一装配路径）
pub fn create_pipeline_with(
    cfg: &AppConfig,
    llm: Arc<dyn LlmClient>,
    geocoder: Arc<dyn Geocoder>,
    places: Arc<dyn PlacesApi>,
) -> TripPipeline {
    let mut researcher_tools = ToolRegistry::new();
    researcher_tools.register(AttractionSearchTool::new(
        geocoder.clone(),
        places,
        cfg.tools.places.search_radius_km,
        cfg.tools.places.max_attractions,
    ));
    researcher_tools.register(DistanceTool::new(geocoder));

    let mut budget_tools = ToolRegistry::new();
    budget_tools.register(CostEstimateTool);

    TripPipeline::new(vec![
        Box::new(ResearcherStage::new(
            llm.clone(),
            researcher_tools,
            cfg.tools.tool_timeout_secs,
            cfg.agents.researcher_max_iterations,
        )),
        Box::new(BudgetStage::new(
            llm.clone(),
            budget_tools,
            cfg.tools.tool_timeout_secs,
            cfg.agents.budget_max_iterations,
        )),
        Box::new(PlannerStage::new(llm)),
    ])
}
