pub mod attractions;
pub mod cost;
pub mod distance;
pub mod executor;
pub mod geocode;
pub mod registry;
pub mod schema;

pub use attractions::{AttractionSearchTool, OpenTripMapClient, PlacesApi};
pub use cost::CostEstimateTool;
pub use distance::DistanceTool;
pub use executor::ToolExecutor;
pub use geocode::{GeoPoint, Geocoder, NominatimGeocoder};
pub use registry::{Tool, ToolRegistry};
pub use schema::tool_call_schema_json;
