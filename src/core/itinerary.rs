//! 行程数据模型
//!
//! 数值字段（daily_cost / total_cost 与各活动费用之和）之间不做交叉校验，
//! 模型给出的数字按原样保留；`day_plans.len() == num_days` 是目标而非强约束。

use serde::{Deserialize, Serialize};

/// 单个活动
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Activity {
    pub name: String,
    /// 时间窗口描述，如 "9:00 AM - 12:00 PM"
    pub time: String,
    pub duration_hours: f64,
    pub cost_usd: f64,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
}

/// 单日计划
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DayPlan {
    /// 从 1 开始
    pub day: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    pub activities: Vec<Activity>,
    pub daily_cost: f64,
    pub summary: String,
}

/// 完整行程
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Itinerary {
    pub destination: String,
    pub num_days: u32,
    pub total_budget: f64,
    pub travel_style: String,
    pub day_plans: Vec<DayPlan>,
    pub total_cost: f64,
    /// "within_budget" 或 "over_budget"，解析成功时按模型自报保留
    pub budget_status: String,
    #[serde(default)]
    pub recommendations: Vec<String>,
    /// RFC 3339 时间戳
    pub created_at: String,
}
