//! LLM 客户端 trait
//!
//! 阶段只依赖 complete（非流式完成），返回纯文本；工具调用通过文本中的 JSON 约定表达，
//! 不依赖后端的 function calling 能力。

use async_trait::async_trait;

use crate::llm::Message;

/// LLM 客户端 trait：输入完整消息列表，输出单条回复文本
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, messages: &[Message]) -> Result<String, String>;

    /// 获取累计 token 使用统计：(prompt_tokens, completion_tokens, total_tokens)
    /// 默认返回 (0, 0, 0)，具体实现可覆盖
    fn token_usage(&self) -> (u64, u64, u64) {
        (0, 0, 0)
    }
}
