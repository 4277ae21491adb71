//! 地理编码：地名 -> 经纬度
//!
//! Geocoder 以 trait 形式作为外部能力接缝，生产实现走 Nominatim；查不到坐标返回
//! Ok(None)（结构化未命中，由调用方组装 success:false 载荷），Err 只表示传输层失败。

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

/// 经纬度坐标
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

/// 地理编码能力：None 表示地名无法解析
#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn geocode(&self, place: &str) -> Result<Option<GeoPoint>, String>;
}

/// Nominatim 响应条目（坐标以字符串返回）
#[derive(Debug, Deserialize)]
struct NominatimEntry {
    lat: String,
    lon: String,
}

/// Nominatim 地理编码客户端；请求带超时与 User-Agent（Nominatim 使用条款要求）
pub struct NominatimGeocoder {
    client: Client,
    base_url: String,
}

impl NominatimGeocoder {
    pub fn new(base_url: &str, timeout_secs: u64) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .user_agent("tripflow/0.1 (trip planning service)")
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl Geocoder for NominatimGeocoder {
    async fn geocode(&self, place: &str) -> Result<Option<GeoPoint>, String> {
        let url = format!("{}/search", self.base_url);
        let resp = self
            .client
            .get(&url)
            .query(&[("q", place), ("format", "json"), ("limit", "1")])
            .send()
            .await
            .map_err(|e| format!("Geocoding request failed: {}", e))?;

        if !resp.status().is_success() {
            return Err(format!("Geocoding HTTP {}", resp.status()));
        }

        let entries: Vec<NominatimEntry> = resp
            .json()
            .await
            .map_err(|e| format!("Geocoding response parse failed: {}", e))?;

        let Some(entry) = entries.first() else {
            return Ok(None);
        };
        let lat = entry
            .lat
            .parse::<f64>()
            .map_err(|e| format!("Invalid latitude in geocoding response: {}", e))?;
        let lon = entry
            .lon
            .parse::<f64>()
            .map_err(|e| format!("Invalid longitude in geocoding response: {}", e))?;
        Ok(Some(GeoPoint { lat, lon }))
    }
}
