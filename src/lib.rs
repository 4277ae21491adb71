//! Tripflow - 多智能体旅行规划服务
//!
//! 模块划分：
//! - **agents**: 三个流水线阶段（Researcher / Budget / Planner）与共享推理循环
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 流水线编排、共享状态与合并、行程数据模型、错误类型
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / Mock）
//! - **server**: HTTP 边界层（请求校验、响应组装、SSE 进度流）
//! - **tools**: 工具箱（景点搜索、距离估算、费用估算）与执行器

pub mod agents;
pub mod config;
pub mod core;
pub mod llm;
pub mod observability;
pub mod server;
pub mod tools;
