//! 单步 ReAct 执行器
//!
//! THINKING -> (ACTING -> OBSERVING -> THINKING)* -> DONE / EXHAUSTED / MALFORMED。
//! 每次进入 THINKING 调用一次模型；解析结果经 parse_step_output 映射到唯一的下一状态。
//! 无法解析或 THINKING 调用失败/超时即 MALFORMED，不改写 prompt 重试；
//! THINKING 次数达到上限即 EXHAUSTED。两种降级都保留 transcript，并以最后一条 Thought 作为 final_text。

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;

use crate::core::trace::{
    InterruptedStep, Observation, PlanStep, StepRecord, StepResult, StepTranscript, TerminationReason, ToolCall,
    ToolContext, TranscriptEntry,
};
use crate::llm::{complete_with_timeout, CompletionOptions, LlmClient, Message};
use crate::react::events::{preview, send_event, RunEvent};
use crate::react::parser::{parse_step_output, StepDirective};
use crate::react::prompts;
use crate::tools::ToolRegistry;

/// 单步内 THINKING 次数默认上限
pub const DEFAULT_MAX_ITERATIONS: usize = 6;

/// 执行一步所需的输入：目标、当前步骤、运行上下文、此前步骤（只读取其评审后的结论）
pub struct StepInput<'a> {
    pub goal: &'a str,
    pub step: &'a PlanStep,
    pub context: &'a ToolContext,
    pub prior: &'a [StepRecord],
}

/// 状态机状态
#[derive(Debug)]
enum StepState {
    Thinking,
    Acting(ToolCall),
    Observing(Observation),
    Done(String),
    Exhausted,
    /// 携带无法解析的原文或模型调用失败原因，Thought 缺失时用作降级文本
    Malformed(String),
}

/// ReAct 单步执行器：持有 LLM、工具注册表、THINKING 上限与超时
pub struct StepExecutor {
    llm: Arc<dyn LlmClient>,
    tools: Arc<ToolRegistry>,
    max_iterations: usize,
    model_timeout: Duration,
    options: CompletionOptions,
    system_prompt: String,
}

impl StepExecutor {
    pub fn new(llm: Arc<dyn LlmClient>, tools: Arc<ToolRegistry>, model_timeout: Duration) -> Self {
        let system_prompt = prompts::executor_system(&tools.catalog());
        Self {
            llm,
            tools,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            model_timeout,
            options: CompletionOptions::default(),
            system_prompt,
        }
    }

    /// 设置 THINKING 次数上限（至少为 1）
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations.max(1);
        self
    }

    pub fn with_options(mut self, options: CompletionOptions) -> Self {
        self.options = options;
        self
    }

    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    /// 执行一步。只有取消会返回 Err（带回已产生的 transcript）；其余失败都体现在 StepResult.terminated_reason 中
    pub async fn execute(
        &self,
        input: &StepInput<'_>,
        cancel: &CancellationToken,
        events: Option<&UnboundedSender<RunEvent>>,
    ) -> Result<StepResult, InterruptedStep> {
        let index = input.step.index;
        let mut transcript = StepTranscript::new();
        let mut iterations = 0;
        let mut state = StepState::Thinking;

        loop {
            state = match state {
                StepState::Thinking => {
                    if iterations >= self.max_iterations {
                        StepState::Exhausted
                    } else {
                        if cancel.is_cancelled() {
                            return Err(interrupted(input, transcript, iterations));
                        }
                        iterations += 1;
                        send_event(events, RunEvent::Thinking { index, iteration: iterations });
                        self.think(input, &mut transcript).await
                    }
                }
                StepState::Acting(call) => {
                    if cancel.is_cancelled() {
                        return Err(interrupted(input, transcript, iterations));
                    }
                    send_event(
                        events,
                        RunEvent::ToolCall {
                            index,
                            tool: call.tool_name.clone(),
                            arguments: call.arguments.clone(),
                        },
                    );
                    let observation = self
                        .tools
                        .dispatch(&call.tool_name, &call.arguments, input.context)
                        .await;
                    StepState::Observing(observation)
                }
                StepState::Observing(observation) => {
                    send_event(
                        events,
                        RunEvent::Observation {
                            index,
                            tool: observation.source_tool.clone(),
                            succeeded: observation.succeeded,
                            preview: preview(&observation.content),
                        },
                    );
                    transcript.push(TranscriptEntry::Observation { observation });
                    StepState::Thinking
                }
                StepState::Done(answer) => {
                    return Ok(self.finish(input, transcript, answer, iterations, TerminationReason::FinalAnswer, events));
                }
                StepState::Exhausted => {
                    let text = degraded_text(&transcript, None, TerminationReason::MaxIters);
                    tracing::warn!(step = index, iterations, "step exhausted without Final Answer");
                    return Ok(self.finish(input, transcript, text, iterations, TerminationReason::MaxIters, events));
                }
                StepState::Malformed(raw) => {
                    let text = degraded_text(&transcript, Some(&raw), TerminationReason::ParseFailure);
                    tracing::warn!(step = index, iterations, "step output malformed");
                    return Ok(self.finish(input, transcript, text, iterations, TerminationReason::ParseFailure, events));
                }
            };
        }
    }

    /// 一次 THINKING：调用模型、解析输出、把 Thought/Action/Final Answer 追加到 transcript
    async fn think(&self, input: &StepInput<'_>, transcript: &mut StepTranscript) -> StepState {
        let messages = vec![
            Message::system(self.system_prompt.clone()),
            Message::user(build_step_prompt(input, transcript)),
        ];
        let raw = match complete_with_timeout(
            self.llm.as_ref(),
            &messages,
            &self.options,
            self.model_timeout,
        )
        .await
        {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(step = input.step.index, error = %e, "executor model call failed");
                return StepState::Malformed(format!("model call failed: {}", e));
            }
        };
        tracing::debug!(step = input.step.index, raw = %raw, "executor output");

        match parse_step_output(&raw) {
            StepDirective::FinalAnswer { thought, answer } => {
                push_thought(transcript, thought);
                transcript.push(TranscriptEntry::FinalAnswer {
                    text: answer.clone(),
                });
                StepState::Done(answer)
            }
            StepDirective::ActionRequest { thought, call } => {
                push_thought(transcript, thought);
                transcript.push(TranscriptEntry::Action { call: call.clone() });
                StepState::Acting(call)
            }
            StepDirective::Thought(text) => {
                transcript.push(TranscriptEntry::Thought { text });
                StepState::Malformed(raw)
            }
            StepDirective::Unparseable(text) => StepState::Malformed(text),
        }
    }

    fn finish(
        &self,
        input: &StepInput<'_>,
        transcript: StepTranscript,
        final_text: String,
        iterations_used: usize,
        terminated_reason: TerminationReason,
        events: Option<&UnboundedSender<RunEvent>>,
    ) -> StepResult {
        send_event(
            events,
            RunEvent::StepFinished {
                index: input.step.index,
                reason: terminated_reason,
                iterations: iterations_used,
            },
        );
        StepResult {
            step: input.step.clone(),
            transcript,
            final_text,
            iterations_used,
            terminated_reason,
        }
    }
}

fn interrupted(input: &StepInput<'_>, transcript: StepTranscript, iterations_used: usize) -> InterruptedStep {
    tracing::warn!(step = input.step.index, iterations_used, "step cancelled");
    InterruptedStep {
        step: input.step.clone(),
        transcript,
        iterations_used,
    }
}

fn push_thought(transcript: &mut StepTranscript, thought: Option<String>) {
    if let Some(text) = thought {
        transcript.push(TranscriptEntry::Thought { text });
    }
}

/// 降级文本：最后一条 Thought > 无法解析的原文 > 固定说明，保证非空
fn degraded_text(transcript: &StepTranscript, raw: Option<&str>, reason: TerminationReason) -> String {
    if let Some(t) = transcript.last_thought() {
        return t.to_string();
    }
    if let Some(r) = raw.map(str::trim).filter(|r| !r.is_empty()) {
        return r.to_string();
    }
    format!("No usable result: step ended {} without a Final Answer.", reason.label())
}

/// 拼接 THINKING 的 user 消息：目标、步骤、上下文、此前步骤结论、本步 transcript
pub fn build_step_prompt(input: &StepInput<'_>, transcript: &StepTranscript) -> String {
    let context = if input.context.is_empty() {
        "(none)".to_string()
    } else {
        input
            .context
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("\n")
    };

    let evidence = if input.prior.is_empty() {
        "(none)".to_string()
    } else {
        input
            .prior
            .iter()
            .map(|rec| {
                let mut s = format!(
                    "Step {} ({}): {}",
                    rec.result.step.index,
                    rec.result.step.description,
                    rec.result.final_text
                );
                for issue in &rec.critique.issues {
                    s.push_str(&format!("\n  reviewer note: {}", issue));
                }
                s
            })
            .collect::<Vec<_>>()
            .join("\n")
    };

    let trace = if transcript.is_empty() {
        "(empty)".to_string()
    } else {
        transcript.render()
    };

    format!(
        "GOAL:\n{}\n\nSTEP DESCRIPTION:\n{}\n\nRUN CONTEXT:\n{}\n\nEVIDENCE FROM EARLIER STEPS:\n{}\n\nTRACE SO FAR:\n{}\n\nFollow the protocol.",
        input.goal, input.step.description, context, evidence, trace
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    use crate::core::trace::{Critique, Verdict};
    use crate::llm::{LlmError, ScriptedLlmClient, ScriptedReply};
    use crate::tools::{Tool, ToolError};

    struct HotelTool;

    #[async_trait]
    impl Tool for HotelTool {
        fn name(&self) -> &str {
            "corporate_hotel"
        }

        fn description(&self) -> &str {
            "hotel lookup"
        }

        async fn invoke(&self, arguments: &str, _context: &ToolContext) -> Result<String, ToolError> {
            Ok(format!("Approved hotel in {}", arguments))
        }
    }

    fn executor(llm: Arc<ScriptedLlmClient>, max: usize) -> StepExecutor {
        let mut tools = ToolRegistry::new(Duration::from_secs(1));
        tools.register(HotelTool);
        StepExecutor::new(llm, Arc::new(tools), Duration::from_millis(100)).with_max_iterations(max)
    }

    async fn run(exec: &StepExecutor, prior: &[StepRecord]) -> StepResult {
        let step = PlanStep::new(1, "Find a hotel");
        let ctx = ToolContext::new();
        let input = StepInput {
            goal: "Brief me",
            step: &step,
            context: &ctx,
            prior,
        };
        exec.execute(&input, &CancellationToken::new(), None)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_action_then_final_answer() {
        let llm = Arc::new(ScriptedLlmClient::new([
            "Thought: look it up\nAction: corporate_hotel\nAction Input: Hyderabad",
            "Thought: got it\nFinal Answer: Stay at the approved hotel.",
        ]));
        let result = run(&executor(llm.clone(), 5), &[]).await;
        assert_eq!(result.terminated_reason, TerminationReason::FinalAnswer);
        assert_eq!(result.final_text, "Stay at the approved hotel.");
        assert_eq!(result.iterations_used, 2);
        let obs = result
            .transcript
            .entries()
            .iter()
            .find_map(|e| match e {
                TranscriptEntry::Observation { observation } => Some(observation.clone()),
                _ => None,
            })
            .unwrap();
        assert!(obs.succeeded);
        assert_eq!(obs.content, "Approved hotel in Hyderabad");

        // 第二次 THINKING 的 prompt 中带有本步 transcript
        let second = &llm.calls()[1];
        assert!(second[1].content.contains("Observation: Approved hotel in Hyderabad"));
    }

    #[tokio::test]
    async fn test_exhausted_at_exact_bound() {
        let replies: Vec<String> = (0..10)
            .map(|i| format!("Thought: attempt {}\nAction: corporate_hotel\nAction Input: X", i))
            .collect();
        let llm = Arc::new(ScriptedLlmClient::new(replies));
        let result = run(&executor(llm.clone(), 3), &[]).await;
        assert_eq!(result.terminated_reason, TerminationReason::MaxIters);
        assert_eq!(result.iterations_used, 3);
        assert_eq!(llm.call_count(), 3);
        assert_eq!(result.final_text, "attempt 2");
    }

    #[tokio::test]
    async fn test_malformed_first_response() {
        let llm = Arc::new(ScriptedLlmClient::new(["Sure! Here is some text without markers."]));
        let result = run(&executor(llm.clone(), 5), &[]).await;
        assert_eq!(result.terminated_reason, TerminationReason::ParseFailure);
        assert_eq!(result.iterations_used, 1);
        assert_eq!(llm.call_count(), 1);
        assert!(!result.final_text.is_empty());
    }

    #[tokio::test]
    async fn test_thought_only_is_malformed_and_keeps_thought() {
        let llm = Arc::new(ScriptedLlmClient::new(["Thought: I should probably check something"]));
        let result = run(&executor(llm, 5), &[]).await;
        assert_eq!(result.terminated_reason, TerminationReason::ParseFailure);
        assert_eq!(result.final_text, "I should probably check something");
    }

    #[tokio::test]
    async fn test_model_timeout_is_malformed() {
        let llm = Arc::new(ScriptedLlmClient::new([ScriptedReply::Delayed(
            Duration::from_secs(5),
            "Final Answer: too late".to_string(),
        )]));
        let result = run(&executor(llm, 5), &[]).await;
        assert_eq!(result.terminated_reason, TerminationReason::ParseFailure);
        assert!(result.final_text.contains("timed out"));
    }

    #[tokio::test]
    async fn test_unknown_tool_observation_lets_loop_continue() {
        let llm = Arc::new(ScriptedLlmClient::new([
            "Action: nonexistent_tool\nAction Input: x",
            "Final Answer: gave up gracefully",
        ]));
        let result = run(&executor(llm, 5), &[]).await;
        assert_eq!(result.terminated_reason, TerminationReason::FinalAnswer);
        let failed = result.transcript.entries().iter().any(|e| {
            matches!(e, TranscriptEntry::Observation { observation } if !observation.succeeded
                && observation.content.contains("UnknownTool"))
        });
        assert!(failed);
    }

    #[tokio::test]
    async fn test_cancelled_before_model_call() {
        let llm = Arc::new(ScriptedLlmClient::new(["Final Answer: x"]));
        let exec = executor(llm.clone(), 5);
        let step = PlanStep::new(1, "s");
        let ctx = ToolContext::new();
        let input = StepInput {
            goal: "g",
            step: &step,
            context: &ctx,
            prior: &[],
        };
        let cancel = CancellationToken::new();
        cancel.cancel();
        let partial = exec.execute(&input, &cancel, None).await.unwrap_err();
        assert!(partial.transcript.is_empty());
        assert_eq!(partial.iterations_used, 0);
        assert_eq!(llm.call_count(), 0);
    }

    struct CancellingTool(CancellationToken);

    #[async_trait]
    impl Tool for CancellingTool {
        fn name(&self) -> &str {
            "corporate_hotel"
        }

        fn description(&self) -> &str {
            "cancels the run"
        }

        async fn invoke(&self, _arguments: &str, _context: &ToolContext) -> Result<String, ToolError> {
            self.0.cancel();
            Ok("Harbor Suites".to_string())
        }
    }

    #[tokio::test]
    async fn test_cancel_mid_step_keeps_transcript() {
        let cancel = CancellationToken::new();
        let mut tools = ToolRegistry::new(Duration::from_secs(1));
        tools.register(CancellingTool(cancel.clone()));
        let llm = Arc::new(ScriptedLlmClient::new([
            "Thought: look it up\nAction: corporate_hotel\nAction Input: Hyderabad",
            "Final Answer: unreachable",
        ]));
        let exec = StepExecutor::new(llm.clone(), Arc::new(tools), Duration::from_secs(1));
        let step = PlanStep::new(2, "Hotel");
        let ctx = ToolContext::new();
        let input = StepInput {
            goal: "g",
            step: &step,
            context: &ctx,
            prior: &[],
        };

        let partial = exec.execute(&input, &cancel, None).await.unwrap_err();
        assert_eq!(partial.step.index, 2);
        assert_eq!(partial.iterations_used, 1);
        let entries = partial.transcript.entries();
        assert_eq!(entries.len(), 3);
        assert!(matches!(
            &entries[2],
            TranscriptEntry::Observation { observation } if observation.content == "Harbor Suites"
        ));
        assert_eq!(llm.call_count(), 1);
    }

    #[tokio::test]
    async fn test_prior_steps_visible_only_as_critiqued_results() {
        let mut earlier_transcript = StepTranscript::new();
        earlier_transcript.push(TranscriptEntry::Thought {
            text: "secret scratchpad".into(),
        });
        let prior = vec![StepRecord {
            result: StepResult {
                step: PlanStep::new(1, "Background"),
                transcript: earlier_transcript,
                final_text: "City X is a tech hub".into(),
                iterations_used: 1,
                terminated_reason: TerminationReason::FinalAnswer,
            },
            critique: Critique {
                step_index: 1,
                issues: vec!["cite population".into()],
                verdict: Verdict::AcceptWithNotes,
                revision: None,
            },
        }];
        let llm = Arc::new(ScriptedLlmClient::new(["Final Answer: ok"]));
        run(&executor(llm.clone(), 5), &prior).await;
        let prompt = &llm.calls()[0][1].content;
        assert!(prompt.contains("Step 1 (Background): City X is a tech hub"));
        assert!(prompt.contains("reviewer note: cite population"));
        assert!(!prompt.contains("secret scratchpad"));
    }

    #[tokio::test]
    async fn test_model_error_degraded_text_non_empty() {
        let llm = Arc::new(ScriptedLlmClient::new([ScriptedReply::Fail(LlmError::EmptyResponse)]));
        let result = run(&executor(llm, 5), &[]).await;
        assert_eq!(result.terminated_reason, TerminationReason::ParseFailure);
        assert_eq!(result.final_text, "model call failed: empty response");
    }
}
