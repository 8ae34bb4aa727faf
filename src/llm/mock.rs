//! 测试与离线用 LLM 客户端（无需 API）
//!
//! - MockLlmClient：按 system prompt 识别所处阶段，给出固定格式的回复，便于本地跑通整条流水线。
//! - ScriptedLlmClient：按调用序号返回预置回复，并记录每次收到的消息，供测试断言。

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::llm::{CompletionOptions, LlmClient, LlmError, Message, Role};
use crate::react::prompts::{
    CRITIC_ROLE, EXECUTOR_ROLE, PLANNER_ROLE, SYNTHESIZER_ROLE,
};

fn system_text(messages: &[Message]) -> &str {
    messages
        .iter()
        .find(|m| matches!(m.role, Role::System))
        .map(|m| m.content.as_str())
        .unwrap_or("")
}

fn last_user(messages: &[Message]) -> &str {
    messages
        .iter()
        .rev()
        .find(|m| matches!(m.role, Role::User))
        .map(|m| m.content.as_str())
        .unwrap_or("(no input)")
}

/// 取 user 消息中 `HEADER:` 之后的第一行
fn section_line<'a>(text: &'a str, header: &str) -> &'a str {
    text.split_once(header)
        .and_then(|(_, rest)| rest.lines().map(str::trim).find(|l| !l.is_empty()))
        .unwrap_or("")
}

/// Mock 客户端：离线回显，不调用任何工具
#[derive(Debug, Default)]
pub struct MockLlmClient;

#[async_trait]
impl LlmClient for MockLlmClient {
    fn name(&self) -> &str {
        "mock"
    }

    async fn complete(
        &self,
        messages: &[Message],
        _options: &CompletionOptions,
    ) -> Result<String, LlmError> {
        let system = system_text(messages);
        let user = last_user(messages);

        let reply = if system.starts_with(PLANNER_ROLE) {
            let goal = section_line(user, "GOAL:");
            format!(
                "PLAN:\n1. Gather background facts for: {goal}\n\
                 2. Check current weather conditions relevant to: {goal}\n\
                 3. Find policy-approved hotel guidance for: {goal}"
            )
        } else if system.starts_with(EXECUTOR_ROLE) {
            let step = section_line(user, "STEP DESCRIPTION:");
            format!(
                "Thought: Offline mode, answering from the step description alone.\n\
                 Final Answer: (mock) {step}"
            )
        } else if system.starts_with(CRITIC_ROLE) {
            "CRITIQUE:\nNo issues.".to_string()
        } else if system.starts_with(SYNTHESIZER_ROLE) {
            format!("EXECUTIVE BRIEF:\n(mock) {}", section_line(user, "USER GOAL:"))
        } else {
            format!("Echo from Mock: {user}")
        };
        Ok(reply)
    }
}

/// 单次预置回复
#[derive(Debug, Clone)]
pub enum ScriptedReply {
    Text(String),
    Fail(LlmError),
    /// 先等待再返回文本（用于超时测试）
    Delayed(Duration, String),
}

impl From<&str> for ScriptedReply {
    fn from(s: &str) -> Self {
        ScriptedReply::Text(s.to_string())
    }
}

impl From<String> for ScriptedReply {
    fn from(s: String) -> Self {
        ScriptedReply::Text(s)
    }
}

/// 按调用序号返回预置回复；回复用完后返回 ScriptExhausted
#[derive(Debug, Default)]
pub struct ScriptedLlmClient {
    replies: Vec<ScriptedReply>,
    calls: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedLlmClient {
    pub fn new<I, R>(replies: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<ScriptedReply>,
    {
        Self {
            replies: replies.into_iter().map(Into::into).collect(),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// 已收到的全部调用（按顺序）
    pub fn calls(&self) -> Vec<Vec<Message>> {
        self.calls
            .lock()
            .map(|c| c.clone())
            .unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or(0)
    }
}

#[async_trait]
impl LlmClient for ScriptedLlmClient {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(
        &self,
        messages: &[Message],
        _options: &CompletionOptions,
    ) -> Result<String, LlmError> {
        let index = {
            let mut calls = self
                .calls
                .lock()
                .map_err(|e| LlmError::Request(e.to_string()))?;
            calls.push(messages.to_vec());
            calls.len() - 1
        };
        match self.replies.get(index) {
            Some(ScriptedReply::Text(text)) => Ok(text.clone()),
            Some(ScriptedReply::Fail(err)) => Err(err.clone()),
            Some(ScriptedReply::Delayed(delay, text)) => {
                tokio::time::sleep(*delay).await;
                Ok(text.clone())
            }
            None => Err(LlmError::ScriptExhausted(index)),
        }
    }
}
