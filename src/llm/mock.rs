//! Mock LLM 客户端（用于测试与无 API Key 时的回退）
//!
//! 按脚本顺序返回预置回复，脚本耗尽后重复 fallback；fallback 可配置为固定文本
//! 或固定错误，用于模拟工具循环上限与后端持续失败两类场景。

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::llm::{LlmClient, Message};

/// Mock 客户端：脚本回复队列 + 队列耗尽后的固定回复
pub struct MockLlmClient {
    scripted: Mutex<VecDeque<Result<String, String>>>,
    fallback: Result<String, String>,
}

impl Default for MockLlmClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MockLlmClient {
    pub fn new() -> Self {
        Self {
            scripted: Mutex::new(VecDeque::new()),
            fallback: Ok("OK".to_string()),
        }
    }

    /// 每次调用都返回同一条回复（如固定的 tool call JSON）
    pub fn repeating(reply: impl Into<String>) -> Self {
        Self {
            scripted: Mutex::new(VecDeque::new()),
            fallback: Ok(reply.into()),
        }
    }

    /// 每次调用都失败，模拟后端不可用
    pub fn failing(error: impl Into<String>) -> Self {
        Self {
            scripted: Mutex::new(VecDeque::new()),
            fallback: Err(error.into()),
        }
    }

    /// 追加一条脚本回复（先进先出）
    pub fn with_reply(self, reply: impl Into<String>) -> Self {
        self.scripted
            .lock()
            .unwrap()
            .push_back(Ok(reply.into()));
        self
    }

    /// 追加一条脚本错误
    pub fn with_error(self, error: impl Into<String>) -> Self {
        self.scripted
            .lock()
            .unwrap()
            .push_back(Err(error.into()));
        self
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, _messages: &[Message]) -> Result<String, String> {
        let next = self.scripted.lock().unwrap().pop_front();
        next.unwrap_or_else(|| self.fallback.clone())
    }
}
