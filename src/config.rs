//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `BRIEF__*` 覆盖（双下划线表示嵌套，如 `BRIEF__LLM__PROVIDER=openai`）。
//! 配置只在启动时加载一次，由 OrchestratorBuilder 转成各组件，运行期间不再读取。

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::react::DEFAULT_MAX_ITERATIONS;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub llm: LlmSection,
    pub react: ReactSection,
    pub tools: ToolsSection,
}

/// [llm] 段：后端选择、温度与超时
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    /// 后端：deepseek / openai / mock；未配置 API Key 时回退到 mock
    pub provider: String,
    pub model: Option<String>,
    pub base_url: Option<String>,
    /// 规划与评审使用的温度（低温度保证可复现）
    pub planning_temperature: f32,
    /// 执行与综合使用的温度
    pub temperature: f32,
    /// 单次模型调用超时（秒）
    pub request_timeout_secs: u64,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: "deepseek".to_string(),
            model: None,
            base_url: None,
            planning_temperature: 0.0,
            temperature: 0.2,
            request_timeout_secs: 60,
        }
    }
}

impl LlmSection {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// [react] 段：单步 THINKING 上限
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReactSection {
    pub max_iterations: usize,
}

impl Default for ReactSection {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }
}

/// [tools] 段：调度超时与各工具后端
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ToolsSection {
    /// 单次工具调用超时（秒），在 ToolRegistry::dispatch 中施加
    pub tool_timeout_secs: u64,
    pub wikipedia: WikipediaSection,
    pub weather: WeatherSection,
    pub policy: PolicySection,
}

impl Default for ToolsSection {
    fn default() -> Self {
        Self {
            tool_timeout_secs: 20,
            wikipedia: WikipediaSection::default(),
            weather: WeatherSection::default(),
            policy: PolicySection::default(),
        }
    }
}

/// [tools.wikipedia] 段
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WikipediaSection {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for WikipediaSection {
    fn default() -> Self {
        Self {
            base_url: "https://en.wikipedia.org".to_string(),
            timeout_secs: 10,
        }
    }
}

/// [tools.weather] 段：api_key 未配置时回退到 OPENWEATHER_API_KEY
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WeatherSection {
    pub base_url: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

impl Default for WeatherSection {
    fn default() -> Self {
        Self {
            base_url: "https://api.openweathermap.org/data/2.5/weather".to_string(),
            api_key: None,
            timeout_secs: 10,
        }
    }
}

/// [tools.policy] 段：城市 -> 公司认可酒店说明
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PolicySection {
    pub hotels: BTreeMap<String, String>,
}

impl Default for PolicySection {
    fn default() -> Self {
        let mut hotels = BTreeMap::new();
        hotels.insert(
            "hyderabad".to_string(),
            "MetroLink Executive Suites (~₹5400/night). Walkable to Hitech City offices. \
             Breakfast+gym included. Policy-approved for business stays."
                .to_string(),
        );
        Self { hotels }
    }
}

/// 从 config 目录加载配置，环境变量 BRIEF__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml，找到则作为第一源
/// 2. 若传入 config_path，则追加该文件（必须存在，可覆盖前面的键）
/// 3. 最后叠加环境变量 BRIEF__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    for name in ["config/default", "../config/default"] {
        if std::path::Path::new(&format!("{}.toml", name)).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(path) = config_path {
        builder = builder.add_source(config::File::from(path).required(true));
    }

    builder = builder.add_source(
        config::Environment::with_prefix("BRIEF")
            .separator("__")
            .try_parsing(true),
    );

    builder.build()?.try_deserialize()
}
