//! Planner 阶段：生成逐日行程
//!
//! 无工具，单次模型调用，期望纯 JSON 回复。解析按优先级分四层：整体解析、
//! 代码围栏内解析、首个 `{...}` 区间解析（贪婪、不感知嵌套）、确定性回退行程。
//! 解析成功时 total_cost / budget_status 按模型自报保留，不做复核；
//! 模型调用失败同样落到回退行程，保证任何合法请求都能拿到结构化行程。

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use crate::agents::stage::truncated_json;
use crate::core::{Activity, DayPlan, Itinerary, PipelineState, PipelineStage, StageUpdate};
use crate::llm::{LlmClient, Message};

/// 拼入提示词的调研 / 预算结果字符预算
const RESEARCH_CONTEXT_CHARS: usize = 1000;
const BUDGET_CONTEXT_CHARS: usize = 500;

const SYSTEM_PROMPT: &str = r#"You are a trip planner that produces detailed day-by-day itineraries.

CRITICAL: respond with ONLY a valid JSON object. No text before or after it.

The JSON object must have this exact structure:
{
  "day_plans": [
    {
      "day": 1,
      "activities": [
        {
          "name": "Visit the Louvre",
          "time": "9:00 AM - 12:00 PM",
          "duration_hours": 3.0,
          "cost_usd": 25.0,
          "description": "World-class art museum",
          "reasoning": "Matches the museums interest"
        }
      ],
      "daily_cost": 150.0,
      "summary": "Museums and landmarks day"
    }
  ],
  "total_cost": 450.0,
  "budget_status": "within_budget",
  "recommendations": ["Book tickets in advance"]
}

Rules:
1. Plan 3-5 activities per day with realistic costs and timing.
2. Match the user's interests.
3. Set budget_status to "within_budget" when total_cost <= budget, otherwise "over_budget".
4. Output nothing but the JSON object."#;

/// 模型回复中期望的行程载荷；缺省字段在组装 Itinerary 时补齐
#[derive(Debug, Deserialize)]
struct PlannerPayload {
    #[serde(default)]
    day_plans: Vec<DayPlan>,
    total_cost: Option<f64>,
    budget_status: Option<String>,
    #[serde(default)]
    recommendations: Vec<String>,
}

/// 行程 JSON 的提取路径（可观测：日志会记录命中的层级）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionPath {
    Direct,
    Fence,
    Scan,
    Fallback,
}

impl ExtractionPath {
    fn as_str(&self) -> &'static str {
        match self {
            ExtractionPath::Direct => "direct",
            ExtractionPath::Fence => "fence",
            ExtractionPath::Scan => "scan",
            ExtractionPath::Fallback => "fallback",
        }
    }
}

/// 首个代码围栏内的内容（``` 或 ```json，语言标记行被跳过）
fn fenced_region(s: &str) -> Option<&str> {
    let start = s.find("```")?;
    let rest = &s[start + 3..];
    let body_start = rest.find('\n').map(|i| i + 1).unwrap_or(0);
    let body = &rest[body_start..];
    let end = body.find("```")?;
    Some(&body[..end])
}

/// 首个 `{` 到最后一个 `}` 的区间（贪婪，不感知嵌套）
fn brace_span(s: &str) -> Option<&str> {
    let start = s.find('{')?;
    let end = s.rfind('}')?;
    (end > start).then(|| &s[start..=end])
}

/// 按优先级尝试三层解析；全部失败返回 None（调用方落到回退行程）
fn extract_payload(raw: &str) -> Option<(PlannerPayload, ExtractionPath)> {
    let trimmed = raw.trim();

    if let Ok(payload) = serde_json::from_str::<PlannerPayload>(trimmed) {
        return Some((payload, ExtractionPath::Direct));
    }
    if let Some(inner) = fenced_region(trimmed) {
        if let Some(span) = brace_span(inner) {
            if let Ok(payload) = serde_json::from_str::<PlannerPayload>(span) {
                return Some((payload, ExtractionPath::Fence));
            }
        }
    }
    if let Some(span) = brace_span(trimmed) {
        if let Ok(payload) = serde_json::from_str::<PlannerPayload>(span) {
            return Some((payload, ExtractionPath::Scan));
        }
    }
    None
}

/// 确定性回退行程：每天一条通用活动，费用均摊，总额恰为预算
fn fallback_payload(state: &PipelineState) -> PlannerPayload {
    let per_day = state.budget_usd / state.num_days as f64;
    PlannerPayload {
        day_plans: (1..=state.num_days)
            .map(|day| DayPlan {
                day,
                date: None,
                activities: vec![Activity {
                    name: "Explore the destination".to_string(),
                    time: "9:00 AM - 6:00 PM".to_string(),
                    duration_hours: 8.0,
                    cost_usd: per_day,
                    description: "Planned activities for the day".to_string(),
                    reasoning: None,
                }],
                daily_cost: per_day,
                summary: format!("Day {} activities", day),
            })
            .collect(),
        total_cost: Some(state.budget_usd),
        budget_status: Some("within_budget".to_string()),
        recommendations: vec!["Check the day summaries and adjust to taste".to_string()],
    }
}

fn build_itinerary(state: &PipelineState, payload: PlannerPayload) -> Itinerary {
    Itinerary {
        destination: state.destination.clone(),
        num_days: state.num_days,
        total_budget: state.budget_usd,
        travel_style: state.travel_style.as_str().to_string(),
        day_plans: payload.day_plans,
        total_cost: payload.total_cost.unwrap_or(state.budget_usd),
        budget_status: payload
            .budget_status
            .unwrap_or_else(|| "within_budget".to_string()),
        recommendations: payload.recommendations,
        created_at: chrono::Utc::now().to_rfc3339(),
    }
}

/// Planner 阶段
pub struct PlannerStage {
    llm: Arc<dyn LlmClient>,
}

impl PlannerStage {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    fn user_prompt(state: &PipelineState) -> String {
        format!(
            "Plan a {}-day trip to {}.\n\n\
             Budget: ${} USD\n\
             Travel style: {}\n\
             Interests: {}\n\n\
             Research data: {}\n\
             Budget data: {}\n\n\
             Create {} days of activities, 3-5 per day, with realistic costs, and keep\n\
             total_cost <= ${}. Respond with ONLY the JSON object.",
            state.num_days,
            state.destination,
            state.budget_usd,
            state.travel_style.as_str(),
            state.interests.join(", "),
            truncated_json(&state.research_data, RESEARCH_CONTEXT_CHARS),
            truncated_json(&state.budget_analysis, BUDGET_CONTEXT_CHARS),
            state.num_days,
            state.budget_usd,
        )
    }
}

#[async_trait]
impl PipelineStage for PlannerStage {
    fn name(&self) -> &'static str {
        "planner"
    }

    async fn execute(&self, state: &PipelineState) -> StageUpdate {
        let transcript = vec![
            Message::system(SYSTEM_PROMPT),
            Message::user(Self::user_prompt(state)),
        ];

        let (messages, payload, path, error) = match self.llm.complete(&transcript).await {
            Ok(reply) => match extract_payload(&reply) {
                Some((payload, path)) => {
                    (vec![Message::assistant(reply)], payload, path, None)
                }
                None => {
                    tracing::warn!("itinerary reply was not parseable, synthesizing fallback");
                    (
                        vec![Message::assistant(reply)],
                        fallback_payload(state),
                        ExtractionPath::Fallback,
                        None,
                    )
                }
            },
            Err(e) => {
                tracing::error!(error = %e, "itinerary generation failed, synthesizing fallback");
                (
                    Vec::new(),
                    fallback_payload(state),
                    ExtractionPath::Fallback,
                    Some(e),
                )
            }
        };

        tracing::info!(
            extraction = path.as_str(),
            day_plans = payload.day_plans.len(),
            "itinerary extracted"
        );

        StageUpdate {
            messages,
            itinerary: Some(build_itinerary(state, payload)),
            next_agent: Some("END".to_string()),
            error,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{TravelStyle, TripRequest};
    use crate::llm::MockLlmClient;

    fn state() -> PipelineState {
        PipelineState::new(
            TripRequest {
                destination: "Paris".to_string(),
                num_days: 3,
                budget_usd: 1000.0,
                travel_style: TravelStyle::Budget,
                interests: vec!["food".to_string()],
            }
            .validated()
            .unwrap(),
        )
    }

    fn sample_json() -> String {
        serde_json::json!({
            "day_plans": [{
                "day": 1,
                "activities": [{
                    "name": "Louvre",
                    "time": "9:00 AM - 12:00 PM",
                    "duration_hours": 3.0,
                    "cost_usd": 25.0,
                    "description": "Museum visit"
                }],
                "daily_cost": 120.0,
                "summary": "Museums"
            }],
            "total_cost": 920.0,
            "budget_status": "within_budget",
            "recommendations": ["Book ahead"]
        })
        .to_string()
    }

    #[test]
    fn extraction_direct() {
        let (payload, path) = extract_payload(&sample_json()).unwrap();
        assert_eq!(path, ExtractionPath::Direct);
        assert_eq!(payload.day_plans.len(), 1);
        assert_eq!(payload.total_cost, Some(920.0));
    }

    #[test]
    fn extraction_from_fence() {
        let wrapped = format!("Here is the plan:\n```json\n{}\n```\nEnjoy!", sample_json());
        let (payload, path) = extract_payload(&wrapped).unwrap();
        assert_eq!(path, ExtractionPath::Fence);
        assert_eq!(payload.day_plans.len(), 1);
    }

    #[test]
    fn extraction_from_brace_scan() {
        let wrapped = format!("Sure thing! {} Hope this helps.", sample_json());
        let (payload, path) = extract_payload(&wrapped).unwrap();
        assert_eq!(path, ExtractionPath::Scan);
        assert_eq!(payload.day_plans.len(), 1);
    }

    #[test]
    fn extraction_gives_up_on_prose() {
        assert!(extract_payload("I could not produce a plan today.").is_none());
    }

    #[tokio::test]
    async fn parseable_reply_is_trusted_verbatim() {
        let stage = PlannerStage::new(Arc::new(MockLlmClient::repeating(sample_json())));
        let update = stage.execute(&state()).await;
        let itinerary = update.itinerary.unwrap();
        // 模型自报的 total_cost / budget_status 原样保留
        assert_eq!(itinerary.total_cost, 920.0);
        assert_eq!(itinerary.budget_status, "within_budget");
        assert_eq!(itinerary.day_plans.len(), 1);
        assert_eq!(itinerary.destination, "Paris");
        assert_eq!(update.messages.len(), 1);
        assert!(update.error.is_none());
    }

    #[tokio::test]
    async fn unparseable_reply_falls_back_to_even_split() {
        let stage = PlannerStage::new(Arc::new(MockLlmClient::repeating(
            "Sorry, I can only describe the trip in prose.",
        )));
        let update = stage.execute(&state()).await;
        let itinerary = update.itinerary.unwrap();
        assert_eq!(itinerary.day_plans.len(), 3);
        assert_eq!(itinerary.total_cost, 1000.0);
        assert_eq!(itinerary.budget_status, "within_budget");
        for (i, day) in itinerary.day_plans.iter().enumerate() {
            assert_eq!(day.day, (i + 1) as u32);
            assert_eq!(day.activities.len(), 1);
            assert!((day.daily_cost - 1000.0 / 3.0).abs() < 1e-9);
        }
        assert!(update.error.is_none());
    }

    #[tokio::test]
    async fn llm_failure_still_produces_fallback_itinerary() {
        let stage = PlannerStage::new(Arc::new(MockLlmClient::failing("backend down")));
        let update = stage.execute(&state()).await;
        let itinerary = update.itinerary.unwrap();
        assert_eq!(itinerary.day_plans.len(), 3);
        assert_eq!(itinerary.total_cost, 1000.0);
        assert!(update.messages.is_empty());
        assert_eq!(update.error.as_deref(), Some("backend down"));
    }
}
