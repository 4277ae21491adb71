//! Researcher 阶段：目的地调研
//!
//! 可用工具：search_attractions、calculate_distance。循环上限默认 5 轮，
//! 收尾提示词要求基于真实数据给出目的地总结。

use std::sync::Arc;

use async_trait::async_trait;

use crate::agents::stage::{closing_summary, compose_system_prompt, run_reasoning_loop};
use crate::core::{PipelineState, PipelineStage, StageUpdate};
use crate::llm::{LlmClient, Message};
use crate::tools::{ToolExecutor, ToolRegistry};

const SYSTEM_PROMPT: &str = "You are a destination research agent with access to live data tools.\n\
Your job is to gather current, factual information about a travel destination.\n\
Use search_attractions to find real tourist attractions, and calculate_distance when travel\n\
times between places matter. Focus on highly rated attractions and realistic travel times.";

const CLOSING_PROMPT: &str = "Based on the research above, provide a concise summary of the \
destination and your top recommendations, grounded in the real data you gathered.";

/// Researcher 阶段
pub struct ResearcherStage {
    llm: Arc<dyn LlmClient>,
    executor: ToolExecutor,
    system_prompt: String,
    max_iterations: usize,
}

impl ResearcherStage {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        registry: ToolRegistry,
        tool_timeout_secs: u64,
        max_iterations: usize,
    ) -> Self {
        let executor = ToolExecutor::new(registry, tool_timeout_secs);
        let system_prompt = compose_system_prompt(SYSTEM_PROMPT, &executor);
        Self {
            llm,
            executor,
            system_prompt,
            max_iterations,
        }
    }

    fn user_prompt(state: &PipelineState) -> String {
        format!(
            "Research the destination: {}\n\n\
             User interests: {}\n\
             Trip duration: {} days\n\
             Travel style: {}\n\n\
             Gather live data:\n\
             1. Search for top tourist attractions (search_attractions tool)\n\
             2. Focus on attractions matching the user's interests\n\
             3. Prefer highly rated, popular attractions\n\n\
             Then summarize your findings.",
            state.destination,
            state.interests.join(", "),
            state.num_days,
            state.travel_style.as_str(),
        )
    }
}

#[async_trait]
impl PipelineStage for ResearcherStage {
    fn name(&self) -> &'static str {
        "researcher"
    }

    async fn execute(&self, state: &PipelineState) -> StageUpdate {
        let mut transcript = vec![
            Message::system(self.system_prompt.clone()),
            Message::user(Self::user_prompt(state)),
        ];

        let research_data = run_reasoning_loop(
            self.llm.as_ref(),
            &self.executor,
            &mut transcript,
            self.max_iterations,
        )
        .await;

        match closing_summary(self.llm.as_ref(), &mut transcript, CLOSING_PROMPT).await {
            Ok(summary) => StageUpdate {
                messages: vec![summary],
                research_data: Some(research_data),
                next_agent: Some("budget".to_string()),
                ..Default::default()
            },
            Err(e) => {
                tracing::error!(error = %e, "researcher summary failed");
                StageUpdate {
                    messages: Vec::new(),
                    research_data: Some(research_data),
                    next_agent: Some("budget".to_string()),
                    error: Some(e.to_string()),
                    ..Default::default()
                }
            }
        }
    }
}
