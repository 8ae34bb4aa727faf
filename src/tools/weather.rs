//! 天气工具：OpenWeather current weather（lat/lon）
//!
//! Action Input 为 "LAT,LON"；为空时回退到运行上下文中的 coords。
//! 返回 "{description}, {temp_c}°C"，开尔文转摄氏保留一位小数。

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::core::trace::ToolContext;
use crate::tools::{Tool, ToolError};

/// 运行上下文中坐标的键名
pub const COORDS_KEY: &str = "coords";

#[derive(Debug, Deserialize)]
struct WeatherItem {
    description: String,
}

#[derive(Debug, Deserialize)]
struct MainBlock {
    temp: f64,
}

/// current weather 接口中用到的字段
#[derive(Debug, Deserialize)]
pub struct CurrentWeather {
    weather: Vec<WeatherItem>,
    main: MainBlock,
}

impl CurrentWeather {
    pub fn render(&self) -> Result<String, ToolError> {
        let desc = self
            .weather
            .first()
            .map(|w| w.description.as_str())
            .ok_or_else(|| ToolError::upstream("response has no weather entries"))?;
        Ok(format!("{}, {:.1}°C", desc, kelvin_to_celsius(self.main.temp)))
    }
}

fn kelvin_to_celsius(k: f64) -> f64 {
    ((k - 273.15) * 10.0).round() / 10.0
}

/// 解析 "LAT,LON"，校验取值范围
pub fn parse_coords(raw: &str) -> Result<(f64, f64), ToolError> {
    let raw = raw.trim().trim_matches('"');
    let (lat, lon) = raw
        .split_once(',')
        .ok_or_else(|| ToolError::invalid_arguments(format!("bad lat/lon input: {}", raw)))?;
    let parse = |s: &str| {
        s.trim()
            .parse::<f64>()
            .map_err(|e| ToolError::invalid_arguments(format!("bad lat/lon input: {} ({})", raw, e)))
    };
    let (lat, lon) = (parse(lat)?, parse(lon)?);
    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
        return Err(ToolError::invalid_arguments(format!(
            "coordinates out of range: {}",
            raw
        )));
    }
    Ok((lat, lon))
}

pub struct WeatherTool {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl WeatherTool {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>, timeout_secs: u64) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
        }
    }
}

#[async_trait]
impl Tool for WeatherTool {
    fn name(&self) -> &str {
        "weather_brief"
    }

    fn description(&self) -> &str {
        "weather_brief(\"LAT,LON\") - live weather snapshot for planning travel. Action Input: e.g. 17.44,78.38 (leave empty to use the run's coordinates)"
    }

    async fn invoke(&self, arguments: &str, context: &ToolContext) -> Result<String, ToolError> {
        let raw = if arguments.trim().is_empty() {
            context
                .get(COORDS_KEY)
                .map(String::as_str)
                .ok_or_else(|| ToolError::invalid_arguments("missing coordinates"))?
        } else {
            arguments
        };
        let (lat, lon) = parse_coords(raw)?;
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| ToolError::invalid_arguments("OpenWeather API key is not configured"))?;

        let resp = self
            .client
            .get(&self.base_url)
            .query(&[
                ("lat", lat.to_string()),
                ("lon", lon.to_string()),
                ("appid", api_key.to_string()),
            ])
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(ToolError::upstream(format!("HTTP {}", resp.status())));
        }
        let body: CurrentWeather = resp
            .json()
            .await
            .map_err(|e| ToolError::upstream(format!("bad response body: {}", e)))?;
        body.render()
    }
}
