//! 事实查询工具：Wikipedia REST /page/summary/{title}
//!
//! 返回 "{title} — {description}\n{extract}"；404 视为 NotFound，其余非 2xx 与 JSON 异常视为 Upstream。

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;

use crate::core::trace::ToolContext;
use crate::tools::{Tool, ToolError};

const USER_AGENT: &str = "brief-agent/0.1 (planner-executor-critic)";

/// summary 接口中用到的字段
#[derive(Debug, Deserialize)]
pub struct PageSummary {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub extract: String,
}

impl PageSummary {
    pub fn render(&self) -> String {
        format!("{} — {}\n{}", self.title, self.description, self.extract)
    }
}

/// 标题规范化：空格转下划线，再整体百分号编码为单个路径段
fn encode_title(topic: &str) -> String {
    urlencoding::encode(&topic.trim().replace(' ', "_")).into_owned()
}

pub struct WikipediaTool {
    client: Client,
    base_url: String,
}

impl WikipediaTool {
    pub fn new(base_url: impl Into<String>, timeout_secs: u64) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    fn summary_url(&self, topic: &str) -> String {
        format!(
            "{}/api/rest_v1/page/summary/{}",
            self.base_url.trim_end_matches('/'),
            encode_title(topic)
        )
    }
}

#[async_trait]
impl Tool for WikipediaTool {
    fn name(&self) -> &str {
        "wikipedia_summary"
    }

    fn description(&self) -> &str {
        "wikipedia_summary(topic: str) - factual summary for a city / company / concept. Action Input: the topic, e.g. Hyderabad"
    }

    async fn invoke(&self, arguments: &str, _context: &ToolContext) -> Result<String, ToolError> {
        let topic = arguments.trim().trim_matches('"');
        if topic.is_empty() {
            return Err(ToolError::invalid_arguments("missing topic"));
        }
        let url = self.summary_url(topic);
        tracing::debug!(url = %url, "wikipedia fetch");

        let resp = self.client.get(&url).send().await?;
        match resp.status() {
            s if s.is_success() => {}
            StatusCode::NOT_FOUND => {
                return Err(ToolError::not_found(format!("no article for '{}'", topic)));
            }
            s => return Err(ToolError::upstream(format!("HTTP {}", s))),
        }
        let summary: PageSummary = resp
            .json()
            .await
            .map_err(|e| ToolError::upstream(format!("bad response body: {}", e)))?;
        Ok(summary.render())
    }
}
