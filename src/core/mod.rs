//! 核心编排层：运行轨迹数据模型、错误类型、编排器与构建器

pub mod builder;
pub mod error;
pub mod orchestrator;
pub mod trace;

pub use builder::{create_llm_from_config, Credentials, OrchestratorBuilder};
pub use error::{AgentError, RunFailure, RunStage};
pub use orchestrator::{inject_coords_hint, Orchestrator, RunOutcome};
pub use trace::{
    Critique, InterruptedStep, Observation, PlanStep, RunTrace, StepRecord, StepResult, StepTranscript,
    TerminationReason, ToolCall, ToolContext, TranscriptEntry, Verdict,
};
