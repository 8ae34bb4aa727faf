//! StepCritic：对单步结果做一次建议性评审
//!
//! 只把步骤描述与 final_text（不含 transcript）交给模型；列表行解析为 issues，
//! `REVISED STEP RESULT:` 之后的内容记为 revision。评审不阻断流水线，也不触发重新执行：
//! 模型失败或超时时返回一条 "critique unavailable" 备注，保证轨迹中可见。

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use regex::Regex;

use crate::core::trace::{Critique, PlanStep, StepResult, Verdict};
use crate::llm::{complete_with_timeout, CompletionOptions, LlmClient, Message};
use crate::react::prompts;

const REVISION_MARKER: &str = "REVISED STEP RESULT:";

fn issue_line() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*(?:[-*•]|\d+[.)])\s+(.+)$").expect("valid regex"))
}

/// 「没有问题」类的条目，不计入 issues
fn is_no_issue(text: &str) -> bool {
    let t = text
        .trim()
        .trim_end_matches(['.', '!'])
        .to_uppercase();
    matches!(t.as_str(), "NONE" | "OK" | "N/A" | "NO ISSUES" | "NO ISSUES FOUND")
        || t.starts_with("NO ISSUES")
        || t.starts_with("NO SIGNIFICANT ISSUES")
}

/// 解析评审输出：(issues, revision)
pub fn parse_critique(output: &str) -> (Vec<String>, Option<String>) {
    let (review, revision) = match output.split_once(REVISION_MARKER) {
        Some((review, revised)) => {
            let revised = revised.trim();
            (review, (!revised.is_empty()).then(|| revised.to_string()))
        }
        None => (output, None),
    };

    let issues = review
        .lines()
        .filter_map(|line| issue_line().captures(line))
        .filter_map(|caps| caps.get(1).map(|m| m.as_str().trim().to_string()))
        .filter(|issue| !issue.is_empty() && !is_no_issue(issue))
        .collect();
    (issues, revision)
}

pub struct StepCritic {
    llm: Arc<dyn LlmClient>,
    system_prompt: String,
    options: CompletionOptions,
    timeout: Duration,
}

impl StepCritic {
    pub fn new(llm: Arc<dyn LlmClient>, options: CompletionOptions, timeout: Duration) -> Self {
        Self {
            llm,
            system_prompt: prompts::critic_system(),
            options,
            timeout,
        }
    }

    pub async fn critique(&self, step: &PlanStep, result: &StepResult) -> Critique {
        let messages = vec![
            Message::system(self.system_prompt.clone()),
            Message::user(format!(
                "STEP DESCRIPTION:\n{}\n\nSTEP RESULT:\n{}\n\nNow critique and revise.",
                step.description, result.final_text
            )),
        ];

        let (issues, revision) =
            match complete_with_timeout(self.llm.as_ref(), &messages, &self.options, self.timeout)
                .await
            {
                Ok(output) => {
                    tracing::debug!(step = step.index, raw = %output, "critic output");
                    parse_critique(&output)
                }
                Err(e) => {
                    tracing::warn!(step = step.index, error = %e, "critic unavailable");
                    (vec![format!("critique unavailable: {}", e)], None)
                }
            };

        let verdict = if issues.is_empty() {
            Verdict::Accept
        } else {
            Verdict::AcceptWithNotes
        };
        Critique {
            step_index: step.index,
            issues,
            verdict,
            revision,
        }
    }
}
