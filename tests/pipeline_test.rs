//! 流水线集成测试：ScriptedLlmClient + 本地桩工具，不访问任何外部服务

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use brief::config::AppConfig;
use brief::core::{
    AgentError, Orchestrator, OrchestratorBuilder, RunStage, TerminationReason, ToolContext,
    TranscriptEntry, Verdict,
};
use brief::llm::{LlmError, ScriptedLlmClient, ScriptedReply};
use brief::react::RunEvent;
use brief::tools::{Tool, ToolError, ToolRegistry, COORDS_KEY};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

const GOAL: &str = "Brief me on City X: background, weather, hotel.";

struct StubTool {
    name: &'static str,
    reply: &'static str,
}

#[async_trait]
impl Tool for StubTool {
    fn name(&self) -> &str {
        self.name
    }

    fn description(&self) -> &str {
        "stub"
    }

    async fn invoke(&self, arguments: &str, _context: &ToolContext) -> Result<String, ToolError> {
        Ok(format!("{} ({})", self.reply, arguments))
    }
}

/// 被调用时触发取消，模拟用户在工具执行期间按下 Ctrl-C
struct CancellingTool {
    token: CancellationToken,
}

#[async_trait]
impl Tool for CancellingTool {
    fn name(&self) -> &str {
        "wikipedia_summary"
    }

    fn description(&self) -> &str {
        "cancels the run"
    }

    async fn invoke(&self, _arguments: &str, _context: &ToolContext) -> Result<String, ToolError> {
        self.token.cancel();
        Ok("partial".to_string())
    }
}

fn stub_tools() -> ToolRegistry {
    let mut tools = ToolRegistry::new(Duration::from_secs(1));
    tools.register(StubTool {
        name: "wikipedia_summary",
        reply: "City X is a coastal city",
    });
    tools.register(StubTool {
        name: "weather_brief",
        reply: "clear sky, 22.0°C",
    });
    tools.register(StubTool {
        name: "corporate_hotel",
        reply: "Harbor Suites, policy-approved",
    });
    tools
}

fn orchestrator(llm: Arc<ScriptedLlmClient>, max_iterations: usize) -> Orchestrator {
    let mut cfg = AppConfig::default();
    cfg.react.max_iterations = max_iterations;
    cfg.llm.request_timeout_secs = 5;
    OrchestratorBuilder::new(cfg)
        .with_llm(llm)
        .with_tools(stub_tools())
        .build()
}

fn replies(texts: &[&str]) -> Vec<ScriptedReply> {
    texts.iter().map(|t| ScriptedReply::from(*t)).collect()
}

const PLAN: &str = "PLAN:\n1. Background on City X\n2. Weather in City X\n3. Approved hotel in City X";
const ACCEPT: &str = "CRITIQUE:\nNo issues.";

fn city_x_script() -> Vec<ScriptedReply> {
    replies(&[
        PLAN,
        "Thought: I need background facts.\nAction: wikipedia_summary\nAction Input: City X",
        "Thought: I have the summary.\nFinal Answer: City X is a coastal trade hub.",
        ACCEPT,
        "Thought: Check the weather.\nAction: weather_brief\nAction Input: City X",
        "Thought: Weather is known.\nFinal Answer: Clear sky, 22°C.",
        ACCEPT,
        "Thought: Look up policy hotels.\nAction: corporate_hotel\nAction Input: City X",
        "Thought: Found one.\nFinal Answer: Stay at Harbor Suites.",
        ACCEPT,
        "EXECUTIVE BRIEF:\nCity X is a coastal trade hub; clear sky; stay at Harbor Suites.",
    ])
}

#[tokio::test]
async fn test_city_x_end_to_end() {
    let llm = Arc::new(ScriptedLlmClient::new(city_x_script()));
    let orch = orchestrator(llm.clone(), 6);

    let trace = orch
        .run(GOAL, ToolContext::new(), &CancellationToken::new(), None)
        .await
        .expect("run completes");

    assert_eq!(trace.plan.len(), 3);
    assert_eq!(trace.results.len(), trace.plan.len());
    for (i, record) in trace.results.iter().enumerate() {
        let r = &record.result;
        assert_eq!(r.step.index, i + 1);
        assert_eq!(r.terminated_reason, TerminationReason::FinalAnswer);
        assert_eq!(r.iterations_used, 2);
        let actions = r
            .transcript
            .entries()
            .iter()
            .filter(|e| matches!(e, TranscriptEntry::Action { .. }))
            .count();
        let observations: Vec<_> = r
            .transcript
            .entries()
            .iter()
            .filter_map(|e| match e {
                TranscriptEntry::Observation { observation } => Some(observation),
                _ => None,
            })
            .collect();
        assert_eq!(actions, 1);
        assert_eq!(observations.len(), 1);
        assert!(observations[0].succeeded);
        assert_eq!(record.critique.verdict, Verdict::Accept);
    }
    assert_eq!(
        trace.final_brief.as_deref(),
        Some("EXECUTIVE BRIEF:\nCity X is a coastal trade hub; clear sky; stay at Harbor Suites.")
    );

    let calls = llm.calls();
    assert_eq!(calls.len(), 11);
    let synth_prompt = &calls[10][1].content;
    let a = synth_prompt.find("City X is a coastal trade hub.").unwrap();
    let b = synth_prompt.find("Clear sky, 22°C.").unwrap();
    let c = synth_prompt.find("Stay at Harbor Suites.").unwrap();
    assert!(a < b && b < c);
}

#[tokio::test]
async fn test_later_steps_see_earlier_conclusions_only() {
    let llm = Arc::new(ScriptedLlmClient::new(city_x_script()));
    let orch = orchestrator(llm.clone(), 6);
    orch.run(GOAL, ToolContext::new(), &CancellationToken::new(), None)
        .await
        .expect("run completes");

    // 第 2 步第一次 THINKING（调用序号 4）
    let prompt = &llm.calls()[4][1].content;
    assert!(prompt.contains("Step 1 (Background on City X): City X is a coastal trade hub."));
    assert!(!prompt.contains("Action Input: City X"));
}

#[tokio::test]
async fn test_scripted_runs_serialize_identically() {
    let first = orchestrator(Arc::new(ScriptedLlmClient::new(city_x_script())), 6)
        .run(GOAL, ToolContext::new(), &CancellationToken::new(), None)
        .await
        .expect("first run");
    let second = orchestrator(Arc::new(ScriptedLlmClient::new(city_x_script())), 6)
        .run(GOAL, ToolContext::new(), &CancellationToken::new(), None)
        .await
        .expect("second run");
    assert_eq!(first.to_json().unwrap(), second.to_json().unwrap());
}

#[tokio::test]
async fn test_malformed_first_response_degrades_step() {
    let llm = Arc::new(ScriptedLlmClient::new(replies(&[
        "1. Background on City X",
        "I am not sure what to do here.",
        ACCEPT,
        "EXECUTIVE BRIEF:\nLimited information.",
    ])));
    let trace = orchestrator(llm, 6)
        .run(GOAL, ToolContext::new(), &CancellationToken::new(), None)
        .await
        .expect("degraded steps do not abort the run");

    let r = &trace.results[0].result;
    assert_eq!(r.terminated_reason, TerminationReason::ParseFailure);
    assert_eq!(r.iterations_used, 1);
    assert!(!r.final_text.trim().is_empty());
    assert!(trace.final_brief.is_some());
}

#[tokio::test]
async fn test_never_final_model_exhausts_at_bound() {
    let action = "Thought: keep digging.\nAction: wikipedia_summary\nAction Input: City X";
    let llm = Arc::new(ScriptedLlmClient::new(replies(&[
        "1. Background on City X",
        action,
        action,
        action,
        ACCEPT,
        "EXECUTIVE BRIEF:\nPartial.",
    ])));
    let trace = orchestrator(llm, 3)
        .run(GOAL, ToolContext::new(), &CancellationToken::new(), None)
        .await
        .expect("run completes");

    let r = &trace.results[0].result;
    assert_eq!(r.terminated_reason, TerminationReason::MaxIters);
    assert_eq!(r.iterations_used, 3);
    let thoughts = r
        .transcript
        .entries()
        .iter()
        .filter(|e| matches!(e, TranscriptEntry::Thought { .. }))
        .count();
    assert_eq!(thoughts, 3);
    assert_eq!(r.final_text, "keep digging.");
}

#[tokio::test]
async fn test_unknown_tool_is_failed_observation() {
    let llm = Arc::new(ScriptedLlmClient::new(replies(&[
        "1. Background on City X",
        "Thought: try a tool.\nAction: web_search\nAction Input: City X",
        "Thought: that tool is missing.\nFinal Answer: No data available.",
        ACCEPT,
        "EXECUTIVE BRIEF:\nNo data.",
    ])));
    let trace = orchestrator(llm, 6)
        .run(GOAL, ToolContext::new(), &CancellationToken::new(), None)
        .await
        .expect("run completes");

    let observation = trace.results[0]
        .result
        .transcript
        .entries()
        .iter()
        .find_map(|e| match e {
            TranscriptEntry::Observation { observation } => Some(observation.clone()),
            _ => None,
        })
        .expect("observation recorded");
    assert!(!observation.succeeded);
    assert!(observation.content.contains("UnknownTool"));
    assert_eq!(
        trace.results[0].result.terminated_reason,
        TerminationReason::FinalAnswer
    );
}

#[tokio::test]
async fn test_planning_failure_returns_partial_trace() {
    let llm = Arc::new(ScriptedLlmClient::new(replies(&["I would rather not plan."])));
    let failure = orchestrator(llm.clone(), 6)
        .run(GOAL, ToolContext::new(), &CancellationToken::new(), None)
        .await
        .expect_err("no steps is fatal");

    assert_eq!(failure.stage, RunStage::Planning);
    assert!(matches!(failure.error, AgentError::PlanningFailure(_)));
    assert_eq!(failure.trace.goal, GOAL);
    assert!(failure.trace.plan.is_empty());
    assert_eq!(llm.call_count(), 1);
}

#[tokio::test]
async fn test_synthesis_failure_keeps_all_step_results() {
    let mut script = city_x_script();
    script.pop();
    script.push(ScriptedReply::Fail(LlmError::Request("service unavailable".into())));
    let failure = orchestrator(Arc::new(ScriptedLlmClient::new(script)), 6)
        .run(GOAL, ToolContext::new(), &CancellationToken::new(), None)
        .await
        .expect_err("synthesis failure is fatal");

    assert_eq!(failure.stage, RunStage::Synthesis);
    assert!(matches!(failure.error, AgentError::SynthesisFailure(_)));
    assert_eq!(failure.trace.results.len(), 3);
    assert!(failure.trace.is_complete());
    assert!(failure.trace.final_brief.is_none());
}

#[tokio::test]
async fn test_cancellation_mid_step_returns_partial_trace() {
    let token = CancellationToken::new();
    let mut tools = ToolRegistry::new(Duration::from_secs(1));
    tools.register(CancellingTool {
        token: token.clone(),
    });
    let llm = Arc::new(ScriptedLlmClient::new(replies(&[
        PLAN,
        "Thought: look it up.\nAction: wikipedia_summary\nAction Input: City X",
        "Thought: done.\nFinal Answer: unreachable",
    ])));
    let orch = OrchestratorBuilder::new(AppConfig::default())
        .with_llm(llm.clone())
        .with_tools(tools)
        .build();

    let failure = orch
        .run(GOAL, ToolContext::new(), &token, None)
        .await
        .expect_err("cancelled");

    assert_eq!(failure.stage, RunStage::Execution);
    assert!(matches!(failure.error, AgentError::Cancelled));
    assert_eq!(failure.trace.plan.len(), 3);
    assert!(failure.trace.results.is_empty());
    assert_eq!(llm.call_count(), 2);

    let partial = failure.trace.interrupted.as_ref().expect("in-progress step kept");
    assert_eq!(partial.step.index, 1);
    let observation = partial
        .transcript
        .entries()
        .iter()
        .find_map(|e| match e {
            TranscriptEntry::Observation { observation } => Some(observation),
            _ => None,
        })
        .expect("tool round-trip kept");
    assert_eq!(observation.content, "partial");
    assert!(failure.trace.to_json().unwrap().contains("\"interrupted\""));
}

#[tokio::test]
async fn test_cancelled_before_start_makes_no_model_calls() {
    let llm = Arc::new(ScriptedLlmClient::new(city_x_script()));
    let token = CancellationToken::new();
    token.cancel();
    let failure = orchestrator(llm.clone(), 6)
        .run(GOAL, ToolContext::new(), &token, None)
        .await
        .expect_err("cancelled");
    assert_eq!(failure.stage, RunStage::Planning);
    assert!(matches!(failure.error, AgentError::Cancelled));
    assert_eq!(llm.call_count(), 0);
}

#[tokio::test]
async fn test_events_follow_pipeline_order() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let llm = Arc::new(ScriptedLlmClient::new(city_x_script()));
    orchestrator(llm, 6)
        .run(GOAL, ToolContext::new(), &CancellationToken::new(), Some(&tx))
        .await
        .expect("run completes");
    drop(tx);

    let mut events = Vec::new();
    while let Some(ev) = rx.recv().await {
        events.push(ev);
    }
    assert_eq!(events.first(), Some(&RunEvent::PlanReady { steps: 3 }));
    assert_eq!(events.last(), Some(&RunEvent::BriefReady));

    let step_one: Vec<&RunEvent> = events
        .iter()
        .skip(1)
        .take_while(|e| !matches!(e, RunEvent::StepStarted { index: 2, .. }))
        .collect();
    assert!(matches!(step_one[0], RunEvent::StepStarted { index: 1, .. }));
    assert!(matches!(step_one[1], RunEvent::Thinking { index: 1, iteration: 1 }));
    assert!(matches!(step_one[2], RunEvent::ToolCall { index: 1, .. }));
    assert!(matches!(step_one[3], RunEvent::Observation { index: 1, succeeded: true, .. }));
    assert!(matches!(step_one[4], RunEvent::Thinking { index: 1, iteration: 2 }));
    assert!(matches!(
        step_one[5],
        RunEvent::StepFinished {
            index: 1,
            reason: TerminationReason::FinalAnswer,
            iterations: 2
        }
    ));
    assert!(matches!(
        step_one[6],
        RunEvent::Critiqued {
            index: 1,
            verdict: Verdict::Accept,
            issues: 0
        }
    ));
}

#[tokio::test]
async fn test_coords_hint_reaches_weather_step() {
    let llm = Arc::new(ScriptedLlmClient::new(city_x_script()));
    let mut context = ToolContext::new();
    context.insert(COORDS_KEY.to_string(), "17.44,78.38".to_string());
    let trace = orchestrator(llm.clone(), 6)
        .run(GOAL, context, &CancellationToken::new(), None)
        .await
        .expect("run completes");

    assert_eq!(
        trace.plan[1].description,
        "Weather in City X Use coordinates 17.44,78.38 for weather."
    );
    assert_eq!(trace.plan[0].description, "Background on City X");
    let weather_prompt = &llm.calls()[4][1].content;
    assert!(weather_prompt.contains("Use coordinates 17.44,78.38 for weather."));
    assert!(weather_prompt.contains("coords=17.44,78.38"));
}
