//! 工具调用 JSON Schema 生成（schemars 自动生成）
//!
//! 用于将「合法 tool call」的外层 JSON 结构注入 system prompt，减少 LLM 输出格式错误；
//! 各工具的参数 schema 由 ToolRegistry::to_schema_json 单独给出。

use std::collections::HashMap;

use schemars::{schema_for, JsonSchema};

/// 工具调用请求格式：与推理循环解析的 `{"tool": "...", "args": {...}}` 一致（仅用于 Schema 生成）
#[allow(dead_code)]
#[derive(JsonSchema)]
struct ToolCallFormat {
    /// 工具名，如 search_attractions、calculate_distance、estimate_costs
    pub tool: String,
    /// 工具参数，依工具不同而不同（city、origin、style、days 等）
    pub args: HashMap<String, serde_json::Value>,
}

/// 返回工具调用的 JSON Schema 字符串，可拼入 system prompt
pub fn tool_call_schema_json() -> String {
    let schema = schema_for!(ToolCallFormat);
    serde_json::to_string_pretty(&schema).unwrap_or_else(|_| String::new())
}
