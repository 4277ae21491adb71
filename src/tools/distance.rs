//! 距离估算工具：大圆距离 + 按交通方式折算时长
//!
//! 两个地名经地理编码取坐标后用 haversine 公式求球面距离；任一地名无法解析时
//! 返回 success:false 的结构化载荷并指明缺失项，不向工具边界外抛错。

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::tools::geocode::{GeoPoint, Geocoder};
use crate::tools::Tool;

/// 平均地球半径（公里）
const EARTH_RADIUS_KM: f64 = 6371.0088;
const KM_TO_MILES: f64 = 0.621371;

/// 各交通方式假定均速（km/h）
const WALKING_KMH: f64 = 5.0;
const CYCLING_KMH: f64 = 15.0;
const DRIVING_KMH: f64 = 50.0;
const PUBLIC_TRANSPORT_KMH: f64 = 30.0;

/// haversine 大圆距离（公里）
pub fn haversine_km(a: GeoPoint, b: GeoPoint) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let dlat = (b.lat - a.lat).to_radians();
    let dlon = (b.lon - a.lon).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().asin()
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// 距离（公里）-> 四种交通方式的时长估计（小时，两位小数）
pub fn estimated_durations(distance_km: f64) -> Value {
    json!({
        "walking_hours": round2(distance_km / WALKING_KMH),
        "cycling_hours": round2(distance_km / CYCLING_KMH),
        "driving_hours": round2(distance_km / DRIVING_KMH),
        "public_transport_hours": round2(distance_km / PUBLIC_TRANSPORT_KMH),
    })
}

/// 距离估算工具
pub struct DistanceTool {
    geocoder: Arc<dyn Geocoder>,
}

impl DistanceTool {
    pub fn new(geocoder: Arc<dyn Geocoder>) -> Self {
        Self { geocoder }
    }

    async fn calculate(&self, origin: &str, destination: &str) -> Value {
        let origin_point = match self.geocoder.geocode(origin).await {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!(error = %e, "geocoding failed for origin");
                return json!({"error": e, "success": false});
            }
        };
        let dest_point = match self.geocoder.geocode(destination).await {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!(error = %e, "geocoding failed for destination");
                return json!({"error": e, "success": false});
            }
        };

        let mut missing = Vec::new();
        if origin_point.is_none() {
            missing.push(origin);
        }
        if dest_point.is_none() {
            missing.push(destination);
        }
        if !missing.is_empty() {
            tracing::warn!(missing = ?missing, "could not resolve locations");
            return json!({
                "error": format!("Could not find location(s): {}", missing.join(", ")),
                "success": false,
            });
        }

        let distance_km = haversine_km(origin_point.unwrap(), dest_point.unwrap());
        json!({
            "origin": origin,
            "destination": destination,
            "distance_km": round2(distance_km),
            "distance_miles": round2(distance_km * KM_TO_MILES),
            "estimated_durations": estimated_durations(distance_km),
            "success": true,
        })
    }
}

#[async_trait]
impl Tool for DistanceTool {
    fn name(&self) -> &str {
        "calculate_distance"
    }

    fn description(&self) -> &str {
        "Calculate great-circle distance and travel duration estimates between two locations. Args: {\"origin\": \"Paris\", \"destination\": \"London\"}."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "origin": { "type": "string", "description": "Starting location name" },
                "destination": { "type": "string", "description": "Destination location name" }
            },
            "required": ["origin", "destination"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let origin = args.get("origin").and_then(|v| v.as_str()).unwrap_or("");
        let destination = args
            .get("destination")
            .and_then(|v| v.as_str())
            .unwrap_or("");
        if origin.trim().is_empty() || destination.trim().is_empty() {
            return Ok(
                json!({"error": "Missing origin or destination", "success": false}).to_string(),
            );
        }

        tracing::info!(%origin, %destination, "calculating distance");
        let result = self.calculate(origin, destination).await;
        serde_json::to_string(&result).map_err(|e| e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    /// 固定坐标表的测试替身
    struct StubGeocoder {
        places: HashMap<String, GeoPoint>,
    }

    impl StubGeocoder {
        fn with(places: &[(&str, f64, f64)]) -> Arc<Self> {
            Arc::new(Self {
                places: places
                    .iter()
                    .map(|(name, lat, lon)| {
                        (name.to_string(), GeoPoint { lat: *lat, lon: *lon })
                    })
                    .collect(),
            })
        }
    }

    #[async_trait]
    impl Geocoder for StubGeocoder {
        async fn geocode(&self, place: &str) -> Result<Option<GeoPoint>, String> {
            Ok(self.places.get(place).copied())
        }
    }

    struct FailingGeocoder;

    #[async_trait]
    impl Geocoder for FailingGeocoder {
        async fn geocode(&self, _place: &str) -> Result<Option<GeoPoint>, String> {
            Err("connection refused".to_string())
        }
    }

    #[test]
    fn haversine_paris_london_is_plausible() {
        let paris = GeoPoint { lat: 48.8566, lon: 2.3522 };
        let london = GeoPoint { lat: 51.5074, lon: -0.1278 };
        let d = haversine_km(paris, london);
        assert!((330.0..360.0).contains(&d), "got {d} km");
    }

    #[test]
    fn durations_follow_fixed_divisors() {
        let d = estimated_durations(100.0);
        assert_eq!(d["walking_hours"].as_f64().unwrap(), 20.0);
        assert_eq!(d["cycling_hours"].as_f64().unwrap(), 6.67);
        assert_eq!(d["driving_hours"].as_f64().unwrap(), 2.0);
        assert_eq!(d["public_transport_hours"].as_f64().unwrap(), 3.33);
    }

    #[tokio::test]
    async fn resolvable_pair_returns_distance_payload() {
        let geocoder = StubGeocoder::with(&[
            ("Paris", 48.8566, 2.3522),
            ("London", 51.5074, -0.1278),
        ]);
        let tool = DistanceTool::new(geocoder);
        let out = tool
            .execute(json!({"origin": "Paris", "destination": "London"}))
            .await
            .unwrap();
        let parsed: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(parsed["success"], json!(true));
        let km = parsed["distance_km"].as_f64().unwrap();
        let driving = parsed["estimated_durations"]["driving_hours"]
            .as_f64()
            .unwrap();
        assert_eq!(driving, (km / 50.0 * 100.0).round() / 100.0);
        let miles = parsed["distance_miles"].as_f64().unwrap();
        assert!((miles - km * 0.621371).abs() < 0.01);
    }

    #[tokio::test]
    async fn unresolvable_location_is_a_structured_failure() {
        let geocoder = StubGeocoder::with(&[("Paris", 48.8566, 2.3522)]);
        let tool = DistanceTool::new(geocoder);
        let out = tool
            .execute(json!({"origin": "Paris", "destination": "Atlantis"}))
            .await
            .unwrap();
        let parsed: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(parsed["success"], json!(false));
        assert!(parsed["error"].as_str().unwrap().contains("Atlantis"));
        assert!(!parsed["error"].as_str().unwrap().contains("Paris"));
    }

    #[tokio::test]
    async fn transport_error_stays_inside_the_tool_boundary() {
        let tool = DistanceTool::new(Arc::new(FailingGeocoder));
        let out = tool
            .execute(json!({"origin": "Paris", "destination": "London"}))
            .await
            .unwrap();
        let parsed: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(parsed["success"], json!(false));
    }
}
