//! 认知层：Planner、ReAct 单步执行器、StepCritic、Synthesizer 与输出解析

pub mod critic;
pub mod events;
pub mod loop_;
pub mod parser;
pub mod planner;
pub mod prompts;
pub mod synthesizer;

pub use critic::{parse_critique, StepCritic};
pub use events::RunEvent;
pub use loop_::{StepExecutor, StepInput, DEFAULT_MAX_ITERATIONS};
pub use parser::{parse_step_output, StepDirective};
pub use planner::{parse_plan, Planner};
pub use synthesizer::Synthesizer;
