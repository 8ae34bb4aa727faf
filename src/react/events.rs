//! 运行过程事件：用于实时展示规划、思考、工具调用、观察、评审与综合进度

use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;

use crate::core::trace::{TerminationReason, Verdict};

/// 单个过程事件（可序列化为 JSON 供前端展示）
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunEvent {
    /// 计划已生成
    PlanReady { steps: usize },
    /// 开始执行第 index 步
    StepStarted { index: usize, description: String },
    /// 第 iteration 次进入 THINKING
    Thinking { index: usize, iteration: usize },
    /// 调用工具
    ToolCall {
        index: usize,
        tool: String,
        arguments: String,
    },
    /// 工具返回（预览，避免过长）
    Observation {
        index: usize,
        tool: String,
        succeeded: bool,
        preview: String,
    },
    /// 步骤结束
    StepFinished {
        index: usize,
        reason: TerminationReason,
        iterations: usize,
    },
    /// 评审完成
    Critiqued {
        index: usize,
        verdict: Verdict,
        issues: usize,
    },
    /// 最终简报已生成
    BriefReady,
    /// 致命失败
    Failed { stage: String, reason: String },
}

/// 事件发送端为 None 或接收端已关闭时静默丢弃
pub fn send_event(tx: Option<&UnboundedSender<RunEvent>>, ev: RunEvent) {
    if let Some(t) = tx {
        let _ = t.send(ev);
    }
}

/// Observation 预览最大字符数
pub const OBSERVATION_PREVIEW_CHARS: usize = 200;

pub fn preview(text: &str) -> String {
    if text.chars().count() > OBSERVATION_PREVIEW_CHARS {
        format!(
            "{}...",
            text.chars().take(OBSERVATION_PREVIEW_CHARS).collect::<String>()
        )
    } else {
        text.to_string()
    }
}
