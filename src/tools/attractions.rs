//! 景点搜索工具：地理编码 + OpenTripMap 半径搜索 + 逐条详情
//!
//! PlacesApi 以 trait 形式作为外部能力接缝。单条详情拉取失败只跳过该条目
//! （与推理循环的整体中断语义不同，这里是有意的逐条隔离）；没有名字的条目
//! 静默丢弃，不计入错误。

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::tools::geocode::Geocoder;
use crate::tools::Tool;

/// 固定的兴趣点类目集合
const PLACE_KINDS: &str =
    "museums,theatres,architecture,historic,monuments,cultural,interesting_places";
/// 详情描述截断长度（字符）
const DESCRIPTION_CHARS: usize = 200;
/// 每个条目保留的类目标签数
const MAX_KIND_TAGS: usize = 3;

/// 兴趣点搜索能力：半径搜索返回原始条目列表，详情按 xid 单独拉取
#[async_trait]
pub trait PlacesApi: Send + Sync {
    async fn radius_search(
        &self,
        lat: f64,
        lon: f64,
        radius_m: u32,
        limit: usize,
    ) -> Result<Vec<Value>, String>;

    async fn place_detail(&self, xid: &str) -> Result<Value, String>;
}

/// OpenTripMap 客户端
pub struct OpenTripMapClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl OpenTripMapClient {
    pub fn new(base_url: &str, api_key: String, timeout_secs: u64) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .user_agent("tripflow/0.1 (trip planning service)")
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }
}

#[async_trait]
impl PlacesApi for OpenTripMapClient {
    async fn radius_search(
        &self,
        lat: f64,
        lon: f64,
        radius_m: u32,
        limit: usize,
    ) -> Result<Vec<Value>, String> {
        let url = format!("{}/places/radius", self.base_url);
        let resp = self
            .client
            .get(&url)
            .query(&[
                ("radius", radius_m.to_string()),
                ("lon", lon.to_string()),
                ("lat", lat.to_string()),
                ("kinds", PLACE_KINDS.to_string()),
                ("format", "json".to_string()),
                ("limit", limit.to_string()),
                ("apikey", self.api_key.clone()),
            ])
            .send()
            .await
            .map_err(|e| format!("Places request failed: {}", e))?;

        if !resp.status().is_success() {
            return Err(format!("API error: {}", resp.status()));
        }
        resp.json()
            .await
            .map_err(|e| format!("Places response parse failed: {}", e))
    }

    async fn place_detail(&self, xid: &str) -> Result<Value, String> {
        let url = format!("{}/places/xid/{}", self.base_url, xid);
        let resp = self
            .client
            .get(&url)
            .query(&[("apikey", self.api_key.clone())])
            .send()
            .await
            .map_err(|e| format!("Detail request failed: {}", e))?;

        if !resp.status().is_success() {
            return Err(format!("API error: {}", resp.status()));
        }
        resp.json()
            .await
            .map_err(|e| format!("Detail response parse failed: {}", e))
    }
}

/// 景点搜索工具
pub struct AttractionSearchTool {
    geocoder: Arc<dyn Geocoder>,
    places: Arc<dyn PlacesApi>,
    radius_m: u32,
    default_limit: usize,
}

impl AttractionSearchTool {
    pub fn new(
        geocoder: Arc<dyn Geocoder>,
        places: Arc<dyn PlacesApi>,
        search_radius_km: u32,
        default_limit: usize,
    ) -> Self {
        Self {
            geocoder,
            places,
            radius_m: search_radius_km * 1000,
            default_limit,
        }
    }

    /// 从详情 JSON 提取展示字段；无名条目返回 None
    fn to_attraction(detail: &Value) -> Option<Value> {
        let name = detail.get("name").and_then(|v| v.as_str())?;
        if name.is_empty() || name == "Unknown" {
            return None;
        }

        let description = detail
            .pointer("/wikipedia_extracts/text")
            .and_then(|v| v.as_str())
            .unwrap_or("No description available")
            .chars()
            .take(DESCRIPTION_CHARS)
            .collect::<String>();
        let kinds: Vec<String> = detail
            .get("kinds")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .split(',')
            .filter(|k| !k.is_empty())
            .take(MAX_KIND_TAGS)
            .map(str::to_string)
            .collect();

        Some(json!({
            "name": name,
            "rating": detail.get("rate").and_then(|v| v.as_f64()).unwrap_or(0.0),
            "description": description,
            "kinds": kinds,
            "coordinates": {
                "lat": detail.pointer("/point/lat").cloned().unwrap_or(Value::Null),
                "lon": detail.pointer("/point/lon").cloned().unwrap_or(Value::Null),
            },
        }))
    }

    async fn search(&self, city: &str, limit: usize) -> Value {
        let location = match self.geocoder.geocode(city).await {
            Ok(Some(p)) => p,
            Ok(None) => {
                tracing::warn!(%city, "city not found");
                return json!({"error": format!("City '{}' not found", city), "success": false});
            }
            Err(e) => {
                tracing::warn!(error = %e, "geocoding failed for city");
                return json!({"error": e, "success": false});
            }
        };
        tracing::info!(%city, lat = location.lat, lon = location.lon, "resolved city coordinates");

        let candidates = match self
            .places
            .radius_search(location.lat, location.lon, self.radius_m, limit)
            .await
        {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(error = %e, "places search failed");
                return json!({"error": e, "success": false});
            }
        };

        let mut attractions = Vec::new();
        for place in candidates.iter().take(limit) {
            let Some(xid) = place.get("xid").and_then(|v| v.as_str()) else {
                continue;
            };
            // 单条详情失败只跳过该条目
            match self.places.place_detail(xid).await {
                Ok(detail) => {
                    if let Some(attraction) = Self::to_attraction(&detail) {
                        attractions.push(attraction);
                    }
                }
                Err(e) => {
                    tracing::warn!(%xid, error = %e, "skipping attraction detail");
                    continue;
                }
            }
        }

        tracing::info!(%city, count = attractions.len(), "retrieved attractions");
        json!({
            "city": city,
            "total_found": attractions.len(),
            "attractions": attractions,
            "success": true,
        })
    }
}

#[async_trait]
impl Tool for AttractionSearchTool {
    fn name(&self) -> &str {
        "search_attractions"
    }

    fn description(&self) -> &str {
        "Search real tourist attractions (museums, historic sites, monuments...) around a city. Args: {\"city\": \"Paris\", \"limit\": 15}."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "city": { "type": "string", "description": "City to search around" },
                "limit": { "type": "integer", "minimum": 1, "description": "Max attractions to return" }
            },
            "required": ["city"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let city = args.get("city").and_then(|v| v.as_str()).unwrap_or("").trim();
        if city.is_empty() {
            return Ok(json!({"error": "Missing city", "success": false}).to_string());
        }
        let limit = args
            .get("limit")
            .and_then(|v| v.as_u64())
            .map(|n| n as usize)
            .unwrap_or(self.default_limit)
            .max(1);

        tracing::info!(%city, limit, "searching attractions");
        let result = self.search(city, limit).await;
        serde_json::to_string(&result).map_err(|e| e.to_string())
    }
}
