//! 编排器：Planner -> 逐步 {StepExecutor -> StepCritic} -> Synthesizer
//!
//! 严格串行；每一步只能看到此前步骤评审后的结论。规划、综合失败与取消会终止运行，
//! 并以 RunFailure 带回截至失败时的部分 RunTrace；步骤中途取消时，该步已产生的 transcript
//! 记入 RunTrace.interrupted。

use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;

use crate::core::trace::{PlanStep, RunTrace, StepRecord, ToolContext};
use crate::core::{AgentError, RunFailure, RunStage};
use crate::react::events::{send_event, RunEvent};
use crate::react::{Planner, StepCritic, StepExecutor, StepInput, Synthesizer};
use crate::tools::COORDS_KEY;

/// 运行结果：完成时返回冻结的轨迹，致命失败时返回部分轨迹
pub type RunOutcome = Result<RunTrace, RunFailure>;

/// 计划中提到天气的步骤追加坐标提示
pub fn inject_coords_hint(plan: &mut [PlanStep], context: &ToolContext) {
    let Some(coords) = context.get(COORDS_KEY) else {
        return;
    };
    for step in plan.iter_mut() {
        if step.description.to_lowercase().contains("weather") {
            step.description = format!("{} Use coordinates {} for weather.", step.description, coords);
        }
    }
}

/// 编排器：持有四个阶段组件，自身无可变状态，可被多次运行共享
pub struct Orchestrator {
    planner: Planner,
    executor: StepExecutor,
    critic: StepCritic,
    synthesizer: Synthesizer,
}

impl Orchestrator {
    pub fn new(
        planner: Planner,
        executor: StepExecutor,
        critic: StepCritic,
        synthesizer: Synthesizer,
    ) -> Self {
        Self {
            planner,
            executor,
            critic,
            synthesizer,
        }
    }

    pub fn executor(&self) -> &StepExecutor {
        &self.executor
    }

    /// 执行一次完整运行
    pub async fn run(
        &self,
        goal: &str,
        context: ToolContext,
        cancel: &CancellationToken,
        events: Option<&UnboundedSender<RunEvent>>,
    ) -> RunOutcome {
        let mut trace = RunTrace::new(goal, context);

        let fail = |stage: RunStage, error: AgentError, trace: RunTrace| -> RunOutcome {
            tracing::error!(stage = %stage, error = %error, "run aborted");
            send_event(
                events,
                RunEvent::Failed {
                    stage: stage.to_string(),
                    reason: error.to_string(),
                },
            );
            Err(RunFailure { stage, error, trace })
        };

        // 1. 规划
        if cancel.is_cancelled() {
            return fail(RunStage::Planning, AgentError::Cancelled, trace);
        }
        let mut plan = match self.planner.generate_plan(goal).await {
            Ok(plan) => plan,
            Err(e) => return fail(RunStage::Planning, e, trace),
        };
        inject_coords_hint(&mut plan, &trace.context);
        trace.plan = plan;
        send_event(events, RunEvent::PlanReady { steps: trace.plan.len() });

        // 2. 逐步执行 + 评审
        for step in trace.plan.clone() {
            send_event(
                events,
                RunEvent::StepStarted {
                    index: step.index,
                    description: step.description.clone(),
                },
            );
            tracing::info!(step = step.index, description = %step.description, "executing step");

            let result = {
                let input = StepInput {
                    goal: &trace.goal,
                    step: &step,
                    context: &trace.context,
                    prior: &trace.results,
                };
                self.executor.execute(&input, cancel, events).await
            };
            let result = match result {
                Ok(r) => r,
                Err(partial) => {
                    trace.interrupted = Some(partial);
                    return fail(RunStage::Execution, AgentError::Cancelled, trace);
                }
            };

            if cancel.is_cancelled() {
                return fail(RunStage::Execution, AgentError::Cancelled, trace);
            }
            let critique = self.critic.critique(&step, &result).await;
            send_event(
                events,
                RunEvent::Critiqued {
                    index: step.index,
                    verdict: critique.verdict,
                    issues: critique.issues.len(),
                },
            );
            tracing::info!(
                step = step.index,
                reason = result.terminated_reason.label(),
                verdict = ?critique.verdict,
                "step recorded"
            );
            trace.results.push(StepRecord { result, critique });
        }

        // 3. 综合
        if !trace.is_complete() {
            let err = AgentError::SynthesisFailure("step results do not match the plan".to_string());
            return fail(RunStage::Synthesis, err, trace);
        }
        if cancel.is_cancelled() {
            return fail(RunStage::Synthesis, AgentError::Cancelled, trace);
        }
        match self.synthesizer.synthesize(&trace.goal, &trace.results).await {
            Ok(brief) => {
                trace.final_brief = Some(brief);
                send_event(events, RunEvent::BriefReady);
                tracing::info!(steps = trace.results.len(), "run completed");
                Ok(trace)
            }
            Err(e) => fail(RunStage::Synthesis, e, trace),
        }
    }
}
