//! Orchestrator 构建器：统一的初始化逻辑
//!
//! 配置与凭据在这里一次性转换为 LLM 客户端、工具注册表和 Orchestrator，
//! 之后各组件只通过构造参数拿到所需内容，不再读取环境变量或全局状态。

use std::sync::Arc;
use std::time::Duration;

use crate::config::AppConfig;
use crate::core::Orchestrator;
use crate::llm::{
    create_deepseek_client, CompletionOptions, LlmClient, MockLlmClient, OpenAiClient,
};
use crate::react::{Planner, StepCritic, StepExecutor, Synthesizer};
use crate::tools::{CorporateHotelTool, ToolRegistry, WeatherTool, WikipediaTool};

/// 启动时读取的一组凭据
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub deepseek_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    pub openweather_api_key: Option<String>,
}

impl Credentials {
    /// 唯一读取环境变量的位置
    pub fn from_env() -> Self {
        let var = |k: &str| std::env::var(k).ok().filter(|v| !v.trim().is_empty());
        Self {
            deepseek_api_key: var("DEEPSEEK_API_KEY"),
            openai_api_key: var("OPENAI_API_KEY"),
            openweather_api_key: var("OPENWEATHER_API_KEY"),
        }
    }
}

/// 根据配置与凭据选择 LLM 后端（DeepSeek / OpenAI 兼容 / Mock）
pub fn create_llm_from_config(cfg: &AppConfig, creds: &Credentials) -> Arc<dyn LlmClient> {
    let provider = cfg.llm.provider.to_lowercase();
    match provider.as_str() {
        "mock" => {
            tracing::info!("Using Mock LLM (configured)");
            Arc::new(MockLlmClient)
        }
        "deepseek" if creds.deepseek_api_key.is_some() || creds.openai_api_key.is_some() => {
            let key = creds
                .deepseek_api_key
                .as_deref()
                .or(creds.openai_api_key.as_deref())
                .unwrap_or_default();
            let client = create_deepseek_client(cfg.llm.model.as_deref(), key);
            tracing::info!("Using DeepSeek LLM ({})", client.model());
            Arc::new(client)
        }
        "openai" if creds.openai_api_key.is_some() => {
            let model = cfg.llm.model.as_deref().unwrap_or("gpt-4o-mini");
            let key = creds.openai_api_key.as_deref().unwrap_or_default();
            tracing::info!("Using OpenAI LLM ({})", model);
            Arc::new(OpenAiClient::new(cfg.llm.base_url.as_deref(), model, key))
        }
        _ => {
            tracing::warn!(provider = %provider, "No API key set or provider unknown, using Mock LLM");
            Arc::new(MockLlmClient)
        }
    }
}

/// Orchestrator 构建器
pub struct OrchestratorBuilder {
    config: AppConfig,
    credentials: Credentials,
    llm: Option<Arc<dyn LlmClient>>,
    tools: Option<ToolRegistry>,
}

impl OrchestratorBuilder {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            credentials: Credentials::default(),
            llm: None,
            tools: None,
        }
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }

    /// 指定 LLM（测试中注入 ScriptedLlmClient）
    pub fn with_llm(mut self, llm: Arc<dyn LlmClient>) -> Self {
        self.llm = Some(llm);
        self
    }

    /// 指定工具注册表（替代默认的三个后端）
    pub fn with_tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = Some(tools);
        self
    }

    /// 默认工具集：wikipedia_summary / weather_brief / corporate_hotel
    pub fn build_tool_registry(&self) -> ToolRegistry {
        let t = &self.config.tools;
        let mut tools = ToolRegistry::new(Duration::from_secs(t.tool_timeout_secs));
        tools.register(WikipediaTool::new(
            t.wikipedia.base_url.clone(),
            t.wikipedia.timeout_secs,
        ));
        tools.register(WeatherTool::new(
            t.weather.base_url.clone(),
            t.weather
                .api_key
                .clone()
                .or_else(|| self.credentials.openweather_api_key.clone()),
            t.weather.timeout_secs,
        ));
        tools.register(CorporateHotelTool::new(t.policy.hotels.clone()));
        tools
    }

    pub fn build(mut self) -> Orchestrator {
        let tools = match self.tools.take() {
            Some(tools) => tools,
            None => self.build_tool_registry(),
        };
        let tools = Arc::new(tools);
        let config = &self.config;
        let llm = self
            .llm
            .take()
            .unwrap_or_else(|| create_llm_from_config(config, &self.credentials));

        let timeout = config.llm.request_timeout();
        let planning = CompletionOptions::with_temperature(config.llm.planning_temperature);
        let working = CompletionOptions::with_temperature(config.llm.temperature);

        let planner = Planner::new(llm.clone(), planning, timeout);
        let executor = StepExecutor::new(llm.clone(), tools, timeout)
            .with_max_iterations(config.react.max_iterations)
            .with_options(working);
        let critic = StepCritic::new(llm.clone(), planning, timeout);
        let synthesizer = Synthesizer::new(llm, working, timeout);

        Orchestrator::new(planner, executor, critic, synthesizer)
    }
}
