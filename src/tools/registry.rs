//! 工具注册表与调度
//!
//! 所有工具实现 Tool trait（name / description / invoke），启动时一次性注册进 ToolRegistry。
//! dispatch(name, arguments, context) 是纯调度边界：加超时、输出结构化审计日志，
//! 并把未知工具、工具错误、超时统一转为失败的 Observation，从不向执行器抛错，也不重试。

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::time::timeout;

use crate::core::trace::{Observation, ToolContext};

/// 工具错误类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ToolErrorKind {
    NotFound,
    Upstream,
    InvalidArguments,
    Timeout,
}

impl fmt::Display for ToolErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ToolErrorKind::NotFound => "not found",
            ToolErrorKind::Upstream => "upstream error",
            ToolErrorKind::InvalidArguments => "invalid arguments",
            ToolErrorKind::Timeout => "timeout",
        };
        f.write_str(s)
    }
}

/// 工具返回的类型化错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct ToolError {
    pub kind: ToolErrorKind,
    pub message: String,
}

impl ToolError {
    pub fn new(kind: ToolErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ToolErrorKind::NotFound, message)
    }

    pub fn upstream(message: impl Into<String>) -> Self {
        Self::new(ToolErrorKind::Upstream, message)
    }

    pub fn invalid_arguments(message: impl Into<String>) -> Self {
        Self::new(ToolErrorKind::InvalidArguments, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ToolErrorKind::Timeout, message)
    }
}

impl From<reqwest::Error> for ToolError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ToolError::timeout(e.to_string())
        } else {
            ToolError::upstream(e.to_string())
        }
    }
}

/// 工具 trait：名称、描述（拼入 prompt 的工具目录）、异步调用
///
/// arguments 是模型在 `Action Input:` 后给出的原始文本，由工具自行解析；
/// context 为运行级旁路上下文（如 coords）。
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    async fn invoke(&self, arguments: &str, context: &ToolContext) -> Result<String, ToolError>;
}

/// 工具注册表：按名称存储 Arc<dyn Tool>；无内部可变状态，可被多次运行共享
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
    timeout: Duration,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

impl ToolRegistry {
    pub fn new(timeout: Duration) -> Self {
        Self {
            tools: BTreeMap::new(),
            timeout,
        }
    }

    pub fn register(&mut self, tool: impl Tool + 'static) {
        let name = tool.name().to_string();
        self.tools.insert(name, Arc::new(tool));
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }

    /// 工具目录（按名称排序），用于 THINKING prompt 中的 TOOLS 段落
    pub fn catalog(&self) -> String {
        self.tools
            .iter()
            .map(|(name, tool)| format!("- {}: {}", name, tool.description()))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// 调度一次工具调用；任何失败都以 succeeded=false 的 Observation 返回
    pub async fn dispatch(&self, name: &str, arguments: &str, context: &ToolContext) -> Observation {
        let start = Instant::now();
        let result = match self.tools.get(name) {
            None => Err(ToolError::not_found(format!(
                "UnknownTool: '{}' is not registered (available: {})",
                name,
                self.tool_names().join(", ")
            ))),
            Some(tool) => match timeout(self.timeout, tool.invoke(arguments, context)).await {
                Ok(r) => r,
                Err(_) => Err(ToolError::timeout(format!(
                    "no response within {}s",
                    self.timeout.as_secs_f32()
                ))),
            },
        };

        let outcome = match &result {
            Ok(_) => "ok",
            Err(e) => match e.kind {
                ToolErrorKind::Timeout => "timeout",
                ToolErrorKind::NotFound => "not_found",
                ToolErrorKind::InvalidArguments => "invalid_arguments",
                ToolErrorKind::Upstream => "upstream",
            },
        };
        let audit = serde_json::json!({
            "event": "tool_audit",
            "tool": name,
            "ok": result.is_ok(),
            "outcome": outcome,
            "duration_ms": start.elapsed().as_millis() as u64,
            "args_preview": args_preview(arguments),
        });
        tracing::info!(audit = %audit, "tool");

        match result {
            Ok(content) => Observation::success(name, content),
            Err(e) => Observation::failure(name, format!("[ERROR] {} failed: {}", name, e)),
        }
    }
}

fn args_preview(args: &str) -> String {
    if args.chars().count() > 200 {
        format!("{}...", args.chars().take(200).collect::<String>())
    } else {
        args.to_string()
    }
}
