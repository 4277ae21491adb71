//! Agent 错误类型
//!
//! 阶段内部的模型 / 工具失败会被就地吞掉并转为状态里的 error 字段，
//! 只有请求校验失败与边界层意外错误会作为硬错误返回给调用方。

use thiserror::Error;

/// 流水线运行过程中可能出现的错误（请求校验、LLM、工具、解析）
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("LLM error: {0}")]
    LlmError(String),

    #[error("Tool execution failed: {0}")]
    ToolExecutionFailed(String),

    #[error("Tool timeout: {0}")]
    ToolTimeout(String),

    /// 模型请求了阶段工具列表之外的工具名
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("JSON parse error: {0}")]
    JsonParseError(String),
}
