//! Budget 阶段：费用分析
//!
//! 可用工具：estimate_costs。循环上限默认 3 轮；调研结果以 500 字符预算截断后
//! 拼入提示词，收尾提示词要求给出明确的预算结论。

use std::sync::Arc;

use async_trait::async_trait;

use crate::agents::stage::{
    closing_summary, compose_system_prompt, run_reasoning_loop, truncated_json,
};
use crate::core::{PipelineState, PipelineStage, StageUpdate};
use crate::llm::{LlmClient, Message};
use crate::tools::{ToolExecutor, ToolRegistry};

/// 拼入提示词的调研结果字符预算
const RESEARCH_CONTEXT_CHARS: usize = 500;

const SYSTEM_PROMPT: &str = "You are a budget analysis agent with access to real cost data.\n\
Use the estimate_costs tool to get current daily and total trip costs, compare them with the\n\
user's budget, and give realistic, transparent recommendations. Suggest ways to optimize\n\
spending when the trip runs over budget.";

const CLOSING_PROMPT: &str = "Provide a final budget analysis using the real cost data above. \
Be specific about whether the trip fits within the user's budget.";

/// Budget 阶段
pub struct BudgetStage {
    llm: Arc<dyn LlmClient>,
    executor: ToolExecutor,
    system_prompt: String,
    max_iterations: usize,
}

impl BudgetStage {
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
            "Analyze the budget for this trip using real cost data:\n\n\
             Destination: {}\n\
             Duration: {} days\n\
             Travel style: {}\n\
             User budget: ${} USD\n\n\
             Research data summary: {}\n\n\
             Steps:\n\
             1. Use the estimate_costs tool to get cost estimates\n\
             2. Calculate the total trip cost\n\
             3. Compare with the user budget (${})\n\
             4. Recommend adjustments if the budget does not fit",
            state.destination,
            state.num_days,
            state.travel_style.as_str(),
            state.budget_usd,
            truncated_json(&state.research_data, RESEARCH_CONTEXT_CHARS),
            state.budget_usd,
        )
    }
}

#[async_trait]
impl PipelineStage for BudgetStage {
    fn name(&self) -> &'static str {
        "budget"
    }

    async fn execute(&self, state: &PipelineState) -> StageUpdate {
        let mut transcript = vec![
            Message::system(self.system_prompt.clone()),
            Message::user(Self::user_prompt(state)),
        ];

        let budget_analysis = run_reasoning_loop(
            self.llm.as_ref(),
            &self.executor,
            &mut transcript,
            self.max_iterations,
        )
        .await;

        match closing_summary(self.llm.as_ref(), &mut transcript, CLOSING_PROMPT).await {
            Ok(summary) => StageUpdate {
                messages: vec![summary],
                budget_analysis: Some(budget_analysis),
                next_agent: Some("planner".to_string()),
                ..Default::default()
            },
            Err(e) => {
                tracing::error!(error = %e, "budget summary failed");
                StageUpdate {
                    messages: Vec::new(),
                    budget_analysis: Some(budget_analysis),
                    next_agent: Some("planner".to_string()),
                    error: Some(e.to_string()),
                    ..Default::default()
                }
            }
        }
    }
}
