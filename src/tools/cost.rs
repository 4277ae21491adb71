//! 费用估算工具：静态费用表 + 默认档位回退
//!
//! 费用表取自 Numbeo 与 Budget Your Trip 的 2024 年数据；目的地未收录时用按风格
//! 索引的默认表，风格未识别时回退 mid-range。纯函数，无外部依赖。

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::tools::Tool;

/// 每日四项费用（美元）：住宿、餐饮、交通、活动
#[derive(Debug, Clone, Copy)]
struct DailyRates {
    hotel: f64,
    meals: f64,
    transport: f64,
    activities: f64,
}

impl DailyRates {
    const fn new(hotel: f64, meals: f64, transport: f64, activities: f64) -> Self {
        Self {
            hotel,
            meals,
            transport,
            activities,
        }
    }

    fn daily_total(&self) -> f64 {
        self.hotel + self.meals + self.transport + self.activities
    }
}

/// (目的地, [budget, mid-range, luxury])
const COST_TABLE: &[(&str, [DailyRates; 3])] = &[
    (
        "paris",
        [
            DailyRates::new(60.0, 25.0, 15.0, 20.0),
            DailyRates::new(150.0, 60.0, 20.0, 50.0),
            DailyRates::new(350.0, 120.0, 40.0, 100.0),
        ],
    ),
    (
        "tokyo",
        [
            DailyRates::new(50.0, 20.0, 10.0, 15.0),
            DailyRates::new(120.0, 45.0, 15.0, 40.0),
            DailyRates::new(300.0, 100.0, 30.0, 80.0),
        ],
    ),
    (
        "new york",
        [
            DailyRates::new(100.0, 30.0, 13.0, 25.0),
            DailyRates::new(250.0, 70.0, 20.0, 60.0),
            DailyRates::new(500.0, 150.0, 50.0, 120.0),
        ],
    ),
    (
        "london",
        [
            DailyRates::new(70.0, 30.0, 15.0, 25.0),
            DailyRates::new(180.0, 65.0, 25.0, 55.0),
            DailyRates::new(400.0, 130.0, 45.0, 110.0),
        ],
    ),
    (
        "bali",
        [
            DailyRates::new(25.0, 10.0, 5.0, 15.0),
            DailyRates::new(70.0, 25.0, 10.0, 35.0),
            DailyRates::new(200.0, 60.0, 25.0, 75.0),
        ],
    ),
    (
        "bangkok",
        [
            DailyRates::new(20.0, 8.0, 5.0, 12.0),
            DailyRates::new(60.0, 20.0, 10.0, 30.0),
            DailyRates::new(180.0, 50.0, 20.0, 70.0),
        ],
    ),
    (
        "barcelona",
        [
            DailyRates::new(55.0, 25.0, 12.0, 20.0),
            DailyRates::new(130.0, 55.0, 18.0, 45.0),
            DailyRates::new(320.0, 110.0, 35.0, 95.0),
        ],
    ),
    (
        "dubai",
        [
            DailyRates::new(80.0, 25.0, 15.0, 30.0),
            DailyRates::new(200.0, 60.0, 25.0, 70.0),
            DailyRates::new(500.0, 140.0, 50.0, 150.0),
        ],
    ),
    (
        "rome",
        [
            DailyRates::new(60.0, 25.0, 12.0, 20.0),
            DailyRates::new(140.0, 55.0, 18.0, 45.0),
            DailyRates::new(350.0, 115.0, 35.0, 100.0),
        ],
    ),
    (
        "sydney",
        [
            DailyRates::new(90.0, 35.0, 15.0, 30.0),
            DailyRates::new(200.0, 70.0, 25.0, 65.0),
            DailyRates::new(450.0, 140.0, 45.0, 130.0),
        ],
    ),
];

/// 未收录目的地的默认表
const DEFAULT_RATES: [DailyRates; 3] = [
    DailyRates::new(50.0, 20.0, 10.0, 20.0),
    DailyRates::new(120.0, 50.0, 20.0, 50.0),
    DailyRates::new(300.0, 100.0, 40.0, 100.0),
];

/// 风格名 -> 档位下标；未识别回退 mid-range
fn style_index(style_key: &str) -> usize {
    match style_key {
        "budget" => 0,
        "mid-range" => 1,
        "luxury" => 2,
        _ => 1,
    }
}

fn rates_for(dest_key: &str, style_key: &str) -> DailyRates {
    let idx = style_index(style_key);
    match COST_TABLE.iter().find(|(city, _)| *city == dest_key) {
        Some((_, styles)) => styles[idx],
        None => DEFAULT_RATES[idx],
    }
}

fn round1(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// 费用估算工具
pub struct CostEstimateTool;

impl CostEstimateTool {
    /// 估算每日与全程费用，附各类目百分比（独立取整，合计不保证恰为 100）
    pub fn estimate(destination: &str, style: &str, days: i64) -> Value {
        let dest_key = destination.trim().to_lowercase();
        let style_key = style.trim().to_lowercase();
        let rates = rates_for(&dest_key, &style_key);

        let daily_total = rates.daily_total();
        let trip_total = daily_total * days as f64;

        json!({
            "destination": destination,
            "travel_style": style,
            "num_days": days,
            "daily_costs_usd": {
                "hotel": rates.hotel,
                "meals": rates.meals,
                "transport": rates.transport,
                "activities": rates.activities,
            },
            "daily_total_usd": round2(daily_total),
            "trip_total_usd": round2(trip_total),
            "breakdown_percentage": {
                "accommodation": round1(rates.hotel / daily_total * 100.0),
                "meals": round1(rates.meals / daily_total * 100.0),
                "transport": round1(rates.transport / daily_total * 100.0),
                "activities": round1(rates.activities / daily_total * 100.0),
            },
            "data_source": "Numbeo & Budget Your Trip 2024",
            "success": true,
        })
    }
}

#[async_trait]
impl Tool for CostEstimateTool {
    fn name(&self) -> &str {
        "estimate_costs"
    }

    fn description(&self) -> &str {
        "Estimate daily and total travel costs from real 2024 data. Args: {\"destination\": \"Paris\", \"style\": \"budget|mid-range|luxury\", \"days\": 3}."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "destination": { "type": "string", "description": "Destination city name" },
                "style": { "type": "string", "enum": ["budget", "mid-range", "luxury"] },
                "days": { "type": "integer", "minimum": 1 }
            },
            "required": ["destination", "style", "days"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let destination = args
            .get("destination")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string();
        if destination.trim().is_empty() {
            return Ok(json!({"error": "Missing destination", "success": false}).to_string());
        }
        let style = args
            .get("style")
            .and_then(|v| v.as_str())
            .unwrap_or("mid-range")
            .to_string();
        let days = args.get("days").and_then(|v| v.as_i64()).unwrap_or(1).max(1);

        tracing::info!(%destination, %style, days, "estimating trip costs");
        let result = Self::estimate(&destination, &style, days);
        serde_json::to_string(&result).map_err(|e| e.to_string())
    }
}
