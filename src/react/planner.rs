//! Planner：把目标拆成有序的计划步骤
//!
//! 调用一次 LLM 得到编号列表；parse_plan 提取行首为「数字 + 分隔符」的行（`1.` `1)` `1:` `1 -`），
//! 忽略其它行（包括 `PLAN:` 标题），并从 1 开始重新编号。解析不出任何步骤即 PlanningFailure，不做兜底计划。

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use regex::Regex;

use crate::core::trace::PlanStep;
use crate::core::AgentError;
use crate::llm::{complete_with_timeout, CompletionOptions, LlmClient, Message};
use crate::react::prompts;

fn step_line() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // 分隔符后须有空白，或紧跟非数字字符；"3.5 million" 不算步骤，"1. 3 hotels" 算
    RE.get_or_init(|| {
        Regex::new(r"^\s*\d+\s*[.):\-](?:\s+(\S.*)|([^\d\s].*))$").expect("valid regex")
    })
}

/// 从模型输出中提取步骤，index 按出现顺序从 1 连续编号
pub fn parse_plan(output: &str) -> Vec<PlanStep> {
    output
        .lines()
        .filter_map(|line| step_line().captures(line))
        .filter_map(|caps| {
            caps.get(1)
                .or_else(|| caps.get(2))
                .map(|m| m.as_str().trim().to_string())
        })
        .filter(|desc| !desc.is_empty())
        .enumerate()
        .map(|(i, desc)| PlanStep::new(i + 1, desc))
        .collect()
}

/// Planner：持有 LLM、system prompt 与调用参数
pub struct Planner {
    llm: Arc<dyn LlmClient>,
    system_prompt: String,
    options: CompletionOptions,
    timeout: Duration,
}

impl Planner {
    pub fn new(llm: Arc<dyn LlmClient>, options: CompletionOptions, timeout: Duration) -> Self {
        Self {
            llm,
            system_prompt: prompts::planner_system(),
            options,
            timeout,
        }
    }

    /// 生成计划；模型调用失败、超时或解析为空都是 PlanningFailure
    pub async fn generate_plan(&self, goal: &str) -> Result<Vec<PlanStep>, AgentError> {
        let goal = goal.trim();
        if goal.is_empty() {
            return Err(AgentError::PlanningFailure("goal is empty".to_string()));
        }
        let messages = vec![
            Message::system(self.system_prompt.clone()),
            Message::user(format!("GOAL:\n{}\n\nCreate the PLAN now.", goal)),
        ];
        let output = complete_with_timeout(self.llm.as_ref(), &messages, &self.options, self.timeout)
            .await
            .map_err(|e| AgentError::PlanningFailure(format!("model call failed: {}", e)))?;
        tracing::debug!(raw = %output, "planner output");

        let steps = parse_plan(&output);
        if steps.is_empty() {
            return Err(AgentError::PlanningFailure(format!(
                "no numbered steps in model output: {:?}",
                output.chars().take(200).collect::<String>()
            )));
        }
        tracing::info!(steps = steps.len(), "plan generated");
        Ok(steps)
    }
}
