//! LLM 客户端抽象
//!
//! 所有后端（OpenAI 兼容 / DeepSeek / Mock / Scripted）实现 LlmClient::complete。
//! 调用方通过 complete_with_timeout 为每次调用施加超时，超时统一映射为 LlmError::Timeout。

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::llm::Message;

/// 模型调用错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LlmError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("empty response")]
    EmptyResponse,

    /// ScriptedLlmClient 的预置回复已用完
    #[error("scripted responses exhausted at call {0}")]
    ScriptExhausted(usize),
}

/// 单次调用参数；temperature 为 None 时使用后端默认值
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CompletionOptions {
    pub temperature: Option<f32>,
}

impl CompletionOptions {
    pub fn with_temperature(temperature: f32) -> Self {
        Self {
            temperature: Some(temperature),
        }
    }
}

/// LLM 客户端 trait：多次运行共享同一实例，因此必须 Send + Sync
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(
        &self,
        messages: &[Message],
        options: &CompletionOptions,
    ) -> Result<String, LlmError>;

    /// 后端名称（日志用）
    fn name(&self) -> &str {
        "llm"
    }
}

/// 带超时的 complete
pub async fn complete_with_timeout(
    llm: &dyn LlmClient,
    messages: &[Message],
    options: &CompletionOptions,
    limit: Duration,
) -> Result<String, LlmError> {
    match tokio::time::timeout(limit, llm.complete(messages, options)).await {
        Ok(result) => result,
        Err(_) => Err(LlmError::Timeout(limit)),
    }
}
