//! 核心层：错误类型、共享状态与合并、行程数据模型、流水线编排

pub mod builder;
pub mod error;
pub mod itinerary;
pub mod pipeline;
pub mod state;

pub use builder::{create_llm, create_pipeline, create_pipeline_with};
pub use error::AgentError;
pub use itinerary::{Activity, DayPlan, Itinerary};
pub use pipeline::{PipelineEvent, PipelineStage, TripPipeline};
pub use state::{PipelineState, StageUpdate, TravelStyle, TripRequest};
