//! Synthesizer：把评审后的各步结论合成为一份简报
//!
//! 单次模型调用，输入按计划顺序拼接每步的 final_text 与评审备注；模型原文即简报。
//! 空回复、调用失败或超时都是 SynthesisFailure，没有部分简报兜底。

use std::sync::Arc;
use std::time::Duration;

use crate::core::trace::StepRecord;
use crate::core::AgentError;
use crate::llm::{complete_with_timeout, CompletionOptions, LlmClient, Message};
use crate::react::prompts;

pub struct Synthesizer {
    llm: Arc<dyn LlmClient>,
    system_prompt: String,
    options: CompletionOptions,
    timeout: Duration,
}

/// 按计划顺序拼接各步结论；降级步骤带上终止原因
pub fn render_step_results(records: &[StepRecord]) -> String {
    records
        .iter()
        .map(|rec| {
            let r = &rec.result;
            let mut block = format!(
                "[Step {}] {} (status: {})\n{}",
                r.step.index,
                r.step.description,
                r.terminated_reason.label(),
                r.final_text
            );
            if !rec.critique.issues.is_empty() {
                block.push_str("\nReviewer notes:");
                for issue in &rec.critique.issues {
                    block.push_str(&format!("\n- {}", issue));
                }
            }
            block
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

impl Synthesizer {
    pub fn new(llm: Arc<dyn LlmClient>, options: CompletionOptions, timeout: Duration) -> Self {
        Self {
            llm,
            system_prompt: prompts::synthesizer_system(),
            options,
            timeout,
        }
    }

    /// 调用方需保证 records 与计划一一对应（RunTrace::is_complete）
    pub async fn synthesize(&self, goal: &str, records: &[StepRecord]) -> Result<String, AgentError> {
        if records.is_empty() {
            return Err(AgentError::SynthesisFailure("no step results to synthesize".to_string()));
        }
        let messages = vec![
            Message::system(self.system_prompt.clone()),
            Message::user(format!(
                "USER GOAL:\n{}\n\nSTEP RESULTS:\n{}\n\nNow write the EXECUTIVE BRIEF.",
                goal,
                render_step_results(records)
            )),
        ];
        let brief = complete_with_timeout(self.llm.as_ref(), &messages, &self.options, self.timeout)
            .await
            .map_err(|e| AgentError::SynthesisFailure(format!("model call failed: {}", e)))?;
        let brief = brief.trim();
        if brief.is_empty() {
            return Err(AgentError::SynthesisFailure("empty response".to_string()));
        }
        Ok(brief.to_string())
    }
}
