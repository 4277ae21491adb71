//! 共享推理循环与 Tool Call 解析
//!
//! 模型通过文本中的 JSON 约定请求工具：`{"tool": "...", "args": {...}}`；每轮最多一次
//! 工具调用，结果以 `{tool}_{iteration}` 为键收集，同名工具跨轮调用互不覆盖。
//! 模型或工具调用出错时立即中断整个循环（不做逐轮隔离），已收集的结果保留；
//! 达到迭代上限同样静默结束。

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::AgentError;
use crate::llm::{LlmClient, Message};
use crate::tools::ToolExecutor;

/// LLM 返回的 Tool Call（简化 JSON：{"tool": "search_attractions", "args": {"city": "..."}}）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub tool: String,
    pub args: Value,
}

/// 模型单轮输出：直接回复或工具调用请求
#[derive(Debug, Clone)]
pub enum LlmOutput {
    Reply(String),
    ToolCall(ToolCall),
}

/// 解析 LLM 输出：若含有效 JSON 且 tool 非空则为 ToolCall，否则为 Reply
pub fn parse_llm_output(output: &str) -> Result<LlmOutput, AgentError> {
    let trimmed = output.trim();

    // 尝试提取 JSON 块（```json ... ``` 或纯 JSON）
    let json_str = if let Some(start) = trimmed.find("```json") {
        let rest = &trimmed[start + 7..];
        rest.find("```")
            .map(|end| rest[..end].trim())
            .unwrap_or(rest.trim())
    } else if let Some(start) = trimmed.find('{') {
        if let Some(end) = trimmed.rfind('}') {
            &trimmed[start..=end]
        } else {
            trimmed
        }
    } else {
        return Ok(LlmOutput::Reply(trimmed.to_string()));
    };

    let parsed: ToolCall = serde_json::from_str(json_str)
        .map_err(|e| AgentError::JsonParseError(format!("{}: {}", e, json_str)))?;

    if parsed.tool.is_empty() {
        Ok(LlmOutput::Reply(trimmed.to_string()))
    } else {
        Ok(LlmOutput::ToolCall(parsed))
    }
}

/// 组装阶段 system prompt：角色描述 + Available tools 列表 + 工具 schema
pub fn compose_system_prompt(base: &str, executor: &ToolExecutor) -> String {
    let tool_list: String = executor
        .tool_descriptions()
        .iter()
        .map(|(name, desc)| format!("- {}: {}", name, desc))
        .collect::<Vec<_>>()
        .join("\n");
    if tool_list.is_empty() {
        return base.to_string();
    }
    format!(
        "{}\n\nAvailable tools:\n{}\n\n## Tool call JSON format (to use a tool, output ONLY one JSON object like this)\n```json\n{}\n```\n\n## Tool parameter schemas\n```json\n{}\n```",
        base,
        tool_list,
        crate::tools::tool_call_schema_json(),
        executor.to_schema_json(),
    )
}

/// 将工具结果 JSON 截断到固定字符预算，限制下游提示词大小
pub fn truncated_json(value: &impl Serialize, limit: usize) -> String {
    let text = serde_json::to_string_pretty(value).unwrap_or_default();
    if text.chars().count() > limit {
        let mut cut: String = text.chars().take(limit).collect();
        cut.push_str("...");
        cut
    } else {
        text
    }
}

/// 执行有界推理循环，返回按 `{tool}_{iteration}` 键收集的工具结果
///
/// transcript 需已含 system 与首条 user 消息；模型回复与工具观测会被追加进去。
/// 模型给出非工具回复（或输出无法解析）即正常结束；模型调用失败、工具未注册、
/// 工具执行失败 / 超时则中断循环。
pub async fn run_reasoning_loop(
    llm: &dyn LlmClient,
    executor: &ToolExecutor,
    transcript: &mut Vec<Message>,
    max_iterations: usize,
) -> BTreeMap<String, Value> {
    let mut results = BTreeMap::new();

    for iteration in 0..max_iterations {
        let output = match llm.complete(transcript).await {
            Ok(o) => o,
            Err(e) => {
                tracing::error!(iteration, error = %e, "llm call failed, aborting reasoning loop");
                break;
            }
        };

        match parse_llm_output(&output) {
            Ok(LlmOutput::ToolCall(tc)) => {
                transcript.push(Message::assistant(output.clone()));
                tracing::info!(tool = %tc.tool, iteration, "model requested tool");
                match executor.execute(&tc.tool, tc.args.clone()).await {
                    Ok(result) => {
                        transcript.push(Message::user(format!(
                            "Observation from {}: {}",
                            tc.tool, result
                        )));
                        let parsed = serde_json::from_str(&result)
                            .unwrap_or_else(|_| Value::String(result));
                        results.insert(format!("{}_{}", tc.tool, iteration), parsed);
                    }
                    Err(e) => {
                        tracing::error!(tool = %tc.tool, iteration, error = %e, "tool invocation failed, aborting reasoning loop");
                        break;
                    }
                }
            }
            Ok(LlmOutput::Reply(text)) => {
                // 模型认为信息足够，正常结束
                transcript.push(Message::assistant(text));
                break;
            }
            Err(e) => {
                tracing::warn!(iteration, error = %e, "unparseable model output, treating as final reply");
                transcript.push(Message::assistant(output));
                break;
            }
        }
    }

    results
}

/// 循环结束后的收尾调用：追加固定总结提示词，取模型最终回复作为阶段主输出
pub async fn closing_summary(
    llm: &dyn LlmClient,
    transcript: &mut Vec<Message>,
    closing_prompt: &str,
) -> Result<Message, AgentError> {
    transcript.push(Message::user(closing_prompt));
    llm.complete(transcript)
        .await
        .map(Message::assistant)
        .map_err(AgentError::LlmError)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlmClient;
    use crate::tools::{Tool, ToolRegistry};
    use async_trait::async_trait;
    use serde_json::json;

    struct PingTool;

    #[async_trait]
    impl Tool for PingTool {
        fn name(&self) -> &str {
            "ping"
        }

        fn description(&self) -> &str {
            "replies with pong"
        }

        async fn execute(&self, _args: Value) -> Result<String, String> {
            Ok(json!({"pong": true}).to_string())
        }
    }

    fn ping_executor() -> ToolExecutor {
        let mut registry = ToolRegistry::new();
        registry.register(PingTool);
        ToolExecutor::new(registry, 5)
    }

    fn seed_transcript() -> Vec<Message> {
        vec![Message::system("system"), Message::user("go")]
    }

    #[test]
    fn parse_pure_json_tool_call() {
        let out = parse_llm_output(r#"{"tool": "ping", "args": {"x": 1}}"#).unwrap();
        assert!(matches!(out, LlmOutput::ToolCall(tc) if tc.tool == "ping"));
    }

    #[test]
    fn parse_fenced_tool_call() {
        let text = "Sure, calling a tool:\n```json\n{\"tool\": \"ping\", \"args\": {}}\n```";
        let out = parse_llm_output(text).unwrap();
        assert!(matches!(out, LlmOutput::ToolCall(tc) if tc.tool == "ping"));
    }

    #[test]
    fn parse_plain_text_is_a_reply() {
        let out = parse_llm_output("Paris is lovely in spring.").unwrap();
        assert!(matches!(out, LlmOutput::Reply(_)));
    }

    #[test]
    fn parse_empty_tool_name_is_a_reply() {
        let out = parse_llm_output(r#"{"tool": "", "args": {}}"#).unwrap();
        assert!(matches!(out, LlmOutput::Reply(_)));
    }

    #[test]
    fn parse_braces_without_tool_call_is_an_error() {
        assert!(parse_llm_output("some {weird text} here").is_err());
    }

    #[test]
    fn truncation_respects_char_budget() {
        let value = json!({"key": "v".repeat(1000)});
        let text = truncated_json(&value, 500);
        assert_eq!(text.chars().count(), 503); // 500 + "..."
        let short = truncated_json(&json!({"a": 1}), 500);
        assert!(!short.ends_with("..."));
    }

    #[tokio::test]
    async fn loop_stops_exactly_at_iteration_cap() {
        let llm = MockLlmClient::repeating(r#"{"tool": "ping", "args": {}}"#);
        let executor = ping_executor();
        let mut transcript = seed_transcript();

        let results = run_reasoning_loop(&llm, &executor, &mut transcript, 5).await;

        assert_eq!(results.len(), 5);
        for i in 0..5 {
            assert!(results.contains_key(&format!("ping_{i}")));
        }
        // 每轮追加 assistant + observation 两条
        assert_eq!(transcript.len(), 2 + 10);
    }

    #[tokio::test]
    async fn loop_ends_when_model_replies_without_tool() {
        let llm = MockLlmClient::new()
            .with_reply(r#"{"tool": "ping", "args": {}}"#)
            .with_reply("Here is my summary.");
        let executor = ping_executor();
        let mut transcript = seed_transcript();

        let results = run_reasoning_loop(&llm, &executor, &mut transcript, 5).await;

        assert_eq!(results.len(), 1);
        assert_eq!(
            transcript.last().unwrap().content,
            "Here is my summary."
        );
    }

    #[tokio::test]
    async fn unknown_tool_aborts_loop_but_keeps_partial_results() {
        let llm = MockLlmClient::new()
            .with_reply(r#"{"tool": "ping", "args": {}}"#)
            .with_reply(r#"{"tool": "warp_drive", "args": {}}"#);
        let executor = ping_executor();
        let mut transcript = seed_transcript();

        let results = run_reasoning_loop(&llm, &executor, &mut transcript, 5).await;

        assert_eq!(results.len(), 1);
        assert!(results.contains_key("ping_0"));
    }

    #[tokio::test]
    async fn llm_failure_aborts_loop() {
        let llm = MockLlmClient::failing("backend down");
        let executor = ping_executor();
        let mut transcript = seed_transcript();

        let results = run_reasoning_loop(&llm, &executor, &mut transcript, 5).await;

        assert!(results.is_empty());
        assert_eq!(transcript.len(), 2);
    }
}
