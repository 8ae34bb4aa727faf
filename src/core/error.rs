//! 运行错误类型
//!
//! 只有规划、综合两个边界上的失败（以及用户取消）会终止整次运行；
//! 工具错误与步骤降级（MALFORMED / EXHAUSTED）在各自层内被吸收并记录进轨迹。

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::core::trace::RunTrace;

/// 运行过程中可能向上传播的错误
#[derive(Error, Debug)]
pub enum AgentError {
    /// 计划解析不出任何步骤（或目标为空、规划调用失败）
    #[error("Planning failure: {0}")]
    PlanningFailure(String),

    /// 综合阶段没有拿到可用的模型回复
    #[error("Synthesis failure: {0}")]
    SynthesisFailure(String),

    #[error("Cancelled")]
    Cancelled,
}

/// 致命失败发生的阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStage {
    Planning,
    Execution,
    Synthesis,
}

impl fmt::Display for RunStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunStage::Planning => "planning",
            RunStage::Execution => "execution",
            RunStage::Synthesis => "synthesis",
        };
        f.write_str(s)
    }
}

/// 致命失败：失败阶段、原因与截至失败时的部分轨迹
#[derive(Debug)]
pub struct RunFailure {
    pub stage: RunStage,
    pub error: AgentError,
    pub trace: RunTrace,
}

impl fmt::Display for RunFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "run failed during {} ({} of {} steps recorded): {}",
            self.stage,
            self.trace.results.len(),
            self.trace.plan.len(),
            self.error
        )
    }
}

impl std::error::Error for RunFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}
