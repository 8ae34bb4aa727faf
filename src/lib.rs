//! Brief - 多阶段 ReAct 简报智能体
//!
//! 模块划分：
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 运行轨迹、错误类型、编排器与构建器
//! - **exit_codes**: CLI 的稳定退出码
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / DeepSeek / Mock / Scripted）
//! - **observability**: tracing 日志初始化
//! - **react**: Planner、ReAct 单步执行器、StepCritic、Synthesizer
//! - **report**: 运行轨迹的文本渲染
//! - **tools**: 工具注册表与事实查询 / 天气 / 差旅政策后端

pub mod config;
pub mod core;
pub mod exit_codes;
pub mod llm;
pub mod observability;
pub mod react;
pub mod report;
pub mod tools;
