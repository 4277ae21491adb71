//! 共享流水线状态与阶段部分更新
//!
//! PipelineState 每请求创建一次，按阶段顺序被就地合并；messages 只追加不替换，
//! 其余字段以后写的更新为准。research_data / budget_analysis 用 BTreeMap，
//! 键为 `{tool}_{iteration}`，序列化顺序确定，便于提示词截断与测试断言。

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::error::AgentError;
use crate::core::itinerary::Itinerary;
use crate::llm::Message;

/// 旅行风格档位，同时作为费用表的行键
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TravelStyle {
    Budget,
    MidRange,
    Luxury,
}

impl TravelStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            TravelStyle::Budget => "budget",
            TravelStyle::MidRange => "mid-range",
            TravelStyle::Luxury => "luxury",
        }
    }
}

/// 用户的行程规划请求，校验通过后不再修改
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TripRequest {
    pub destination: String,
    pub num_days: u32,
    pub budget_usd: f64,
    pub travel_style: TravelStyle,
    pub interests: Vec<String>,
}

impl TripRequest {
    /// 校验并归一化请求：目的地至少 2 字符、天数 1-30、预算 >= 100、
    /// 兴趣至少一条（小写并去除首尾空白，空白项丢弃）
    pub fn validated(mut self) -> Result<Self, AgentError> {
        self.destination = self.destination.trim().to_string();
        if self.destination.chars().count() < 2 {
            return Err(AgentError::InvalidRequest(
                "destination must be at least 2 characters".to_string(),
            ));
        }
        if !(1..=30).contains(&self.num_days) {
            return Err(AgentError::InvalidRequest(
                "num_days must be between 1 and 30".to_string(),
            ));
        }
        if self.budget_usd < 100.0 {
            return Err(AgentError::InvalidRequest(
                "budget_usd must be at least 100".to_string(),
            ));
        }
        self.interests = self
            .interests
            .iter()
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .collect();
        if self.interests.is_empty() {
            return Err(AgentError::InvalidRequest(
                "at least one interest is required".to_string(),
            ));
        }
        Ok(self)
    }
}

/// 贯穿三个阶段的共享状态
///
/// 各字段由其所属阶段写入后不再被后续阶段校验或回滚；next_agent 仅作观测记录，
/// 不参与控制流（阶段顺序在流水线里固定）。
#[derive(Debug, Clone)]
pub struct PipelineState {
    pub destination: String,
    pub num_days: u32,
    pub budget_usd: f64,
    pub travel_style: TravelStyle,
    pub interests: Vec<String>,
    /// 各阶段产出的消息，只追加
    pub messages: Vec<Message>,
    /// Researcher 工具结果，键为 `{tool}_{iteration}`
    pub research_data: BTreeMap<String, Value>,
    /// Budget 工具结果，键同上
    pub budget_analysis: BTreeMap<String, Value>,
    pub itinerary: Option<Itinerary>,
    pub next_agent: String,
    /// 最近一个失败阶段的错误描述
    pub error: Option<String>,
}

impl PipelineState {
    pub fn new(request: TripRequest) -> Self {
        Self {
            destination: request.destination,
            num_days: request.num_days,
            budget_usd: request.budget_usd,
            travel_style: request.travel_style,
            interests: request.interests,
            messages: Vec::new(),
            research_data: BTreeMap::new(),
            budget_analysis: BTreeMap::new(),
            itinerary: None,
            next_agent: "researcher".to_string(),
            error: None,
        }
    }

    /// 合并一个阶段的部分更新：messages 拼接，其余字段以更新为准
    pub fn merge(&mut self, update: StageUpdate) {
        self.messages.extend(update.messages);
        if let Some(research) = update.research_data {
            self.research_data = research;
        }
        if let Some(budget) = update.budget_analysis {
            self.budget_analysis = budget;
        }
        if let Some(itinerary) = update.itinerary {
            self.itinerary = Some(itinerary);
        }
        if let Some(next) = update.next_agent {
            self.next_agent = next;
        }
        if let Some(error) = update.error {
            self.error = Some(error);
        }
    }
}

/// 单个阶段返回的部分更新：只包含该阶段负责的字段
#[derive(Debug, Default)]
pub struct StageUpdate {
    pub messages: Vec<Message>,
    pub research_data: Option<BTreeMap<String, Value>>,
    pub budget_analysis: Option<BTreeMap<String, Value>>,
    pub itinerary: Option<Itinerary>,
    pub next_agent: Option<String>,
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn valid_request() -> TripRequest {
        TripRequest {
            destination: "Paris".to_string(),
            num_days: 3,
            budget_usd: 1000.0,
            travel_style: TravelStyle::Budget,
            interests: vec!["Food".to_string(), "  Museums ".to_string()],
        }
    }

    #[test]
    fn validation_normalizes_interests() {
        let req = valid_request().validated().unwrap();
        assert_eq!(req.interests, vec!["food", "museums"]);
    }

    #[test]
    fn validation_rejects_short_destination() {
        let mut req = valid_request();
        req.destination = "P".to_string();
        assert!(req.validated().is_err());
    }

    #[test]
    fn validation_rejects_out_of_range_days() {
        let mut req = valid_request();
        req.num_days = 0;
        assert!(req.clone().validated().is_err());
        req.num_days = 31;
        assert!(req.validated().is_err());
    }

    #[test]
    fn validation_rejects_small_budget() {
        let mut req = valid_request();
        req.budget_usd = 99.0;
        assert!(req.validated().is_err());
    }

    #[test]
    fn validation_rejects_blank_interests() {
        let mut req = valid_request();
        req.interests = vec!["   ".to_string()];
        assert!(req.validated().is_err());
    }

    #[test]
    fn travel_style_wire_names_are_kebab_case() {
        assert_eq!(
            serde_json::to_string(&TravelStyle::MidRange).unwrap(),
            "\"mid-range\""
        );
        let parsed: TravelStyle = serde_json::from_str("\"budget\"").unwrap();
        assert_eq!(parsed, TravelStyle::Budget);
    }

    #[test]
    fn merge_appends_messages_and_replaces_fields() {
        let mut state = PipelineState::new(valid_request().validated().unwrap());
        state.merge(StageUpdate {
            messages: vec![Message::assistant("research summary")],
            research_data: Some(BTreeMap::from([(
                "search_attractions_0".to_string(),
                json!({"success": true}),
            )])),
            next_agent: Some("budget".to_string()),
            ..Default::default()
        });
        state.merge(StageUpdate {
            messages: vec![Message::assistant("budget summary")],
            budget_analysis: Some(BTreeMap::from([(
                "estimate_costs_0".to_string(),
                json!({"success": true}),
            )])),
            next_agent: Some("planner".to_string()),
            error: Some("tool failed".to_string()),
            ..Default::default()
        });

        assert_eq!(state.messages.len(), 2);
        assert_eq!(state.research_data.len(), 1);
        assert_eq!(state.budget_analysis.len(), 1);
        assert_eq!(state.next_agent, "planner");
        assert_eq!(state.error.as_deref(), Some("tool failed"));
    }

    #[test]
    fn merge_keeps_existing_fields_when_update_is_empty() {
        let mut state = PipelineState::new(valid_request().validated().unwrap());
        state.merge(StageUpdate {
            research_data: Some(BTreeMap::from([("k_0".to_string(), json!(1))])),
            error: Some("first".to_string()),
            ..Default::default()
        });
        state.merge(StageUpdate::default());
        assert_eq!(state.research_data.len(), 1);
        assert_eq!(state.error.as_deref(), Some("first"));
    }
}
