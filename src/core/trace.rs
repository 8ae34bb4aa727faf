//! 运行轨迹：计划步骤、工具调用、观察、步骤结果、评审与 RunTrace
//!
//! 全部类型可 serde 序列化，字段名与嵌套结构固定，便于审计日志与跨运行 diff。
//! 不含时间戳与随机 id：同一组模型回复下两次运行的 JSON 输出逐字节一致。

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// 目标附带的旁路上下文（如 coords），对工具可见；BTreeMap 保证序列化顺序稳定
pub type ToolContext = BTreeMap<String, String>;

/// 计划中的一步：index 从 1 开始且连续，顺序即执行顺序
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanStep {
    pub index: usize,
    pub description: String,
}

impl PlanStep {
    pub fn new(index: usize, description: impl Into<String>) -> Self {
        Self {
            index,
            description: description.into(),
        }
    }
}

/// 从模型输出中解析出的工具调用；arguments 对执行器不透明，由工具自行解析
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    pub tool_name: String,
    pub arguments: String,
}

/// 一次工具调用的结果（失败也会记录）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observation {
    pub source_tool: String,
    pub content: String,
    pub succeeded: bool,
}

impl Observation {
    pub fn success(tool: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            source_tool: tool.into(),
            content: content.into(),
            succeeded: true,
        }
    }

    pub fn failure(tool: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            source_tool: tool.into(),
            content: content.into(),
            succeeded: false,
        }
    }
}

/// 步骤 transcript 中的一条记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TranscriptEntry {
    Thought { text: String },
    Action { call: ToolCall },
    Observation { observation: Observation },
    FinalAnswer { text: String },
}

/// 单步 transcript：只追加，步骤结束后只读
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepTranscript {
    entries: Vec<TranscriptEntry>,
}

impl StepTranscript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: TranscriptEntry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 最近一条 Thought（EXHAUSTED / MALFORMED 时作为降级结果）
    pub fn last_thought(&self) -> Option<&str> {
        self.entries.iter().rev().find_map(|e| match e {
            TranscriptEntry::Thought { text } => Some(text.as_str()),
            _ => None,
        })
    }

    /// 渲染为 Thought/Action/Observation 文本，回填给下一轮 THINKING
    pub fn render(&self) -> String {
        let mut out = String::new();
        for entry in &self.entries {
            match entry {
                TranscriptEntry::Thought { text } => {
                    out.push_str(&format!("Thought: {}\n", text));
                }
                TranscriptEntry::Action { call } => {
                    out.push_str(&format!(
                        "Action: {}\nAction Input: {}\n",
                        call.tool_name, call.arguments
                    ));
                }
                TranscriptEntry::Observation { observation } => {
                    out.push_str(&format!("Observation: {}\n", observation.content));
                }
                TranscriptEntry::FinalAnswer { text } => {
                    out.push_str(&format!("Final Answer: {}\n", text));
                }
            }
        }
        out
    }
}

/// 步骤终止原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TerminationReason {
    /// 模型给出了 Final Answer（DONE）
    FinalAnswer,
    /// 达到 THINKING 次数上限（EXHAUSTED）
    MaxIters,
    /// 输出无法解析或 THINKING 调用超时（MALFORMED）
    ParseFailure,
}

impl TerminationReason {
    pub fn label(self) -> &'static str {
        match self {
            TerminationReason::FinalAnswer => "DONE",
            TerminationReason::MaxIters => "EXHAUSTED",
            TerminationReason::ParseFailure => "MALFORMED",
        }
    }
}

/// 单步执行结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepResult {
    pub step: PlanStep,
    pub transcript: StepTranscript,
    pub final_text: String,
    pub iterations_used: usize,
    pub terminated_reason: TerminationReason,
}

/// 评审结论：评审只做标注，不阻断流水线
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    Accept,
    AcceptWithNotes,
}

/// 针对单步结果的评审
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Critique {
    pub step_index: usize,
    pub issues: Vec<String>,
    pub verdict: Verdict,
    /// 评审给出的改写版本（仅记录，不回写 final_text）
    #[serde(default)]
    pub revision: Option<String>,
}

/// 一步的完整记录：执行结果 + 评审
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepRecord {
    pub result: StepResult,
    pub critique: Critique,
}

/// 被取消时尚未结束的步骤：保留已产生的 Thought / Action / Observation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterruptedStep {
    pub step: PlanStep,
    pub transcript: StepTranscript,
    pub iterations_used: usize,
}

/// 一次运行的完整审计记录
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunTrace {
    pub goal: String,
    pub context: ToolContext,
    pub plan: Vec<PlanStep>,
    pub results: Vec<StepRecord>,
    /// 只在运行中途被取消时出现
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interrupted: Option<InterruptedStep>,
    pub final_brief: Option<String>,
}

impl RunTrace {
    pub fn new(goal: impl Into<String>, context: ToolContext) -> Self {
        Self {
            goal: goal.into(),
            context,
            ..Self::default()
        }
    }

    /// 所有计划步骤都已有结果，且顺序与 index 一一对应
    pub fn is_complete(&self) -> bool {
        self.plan.len() == self.results.len()
            && self
                .plan
                .iter()
                .zip(&self.results)
                .all(|(step, record)| step.index == record.result.step.index)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
