//! 内部差旅政策查询：按城市返回公司认可的酒店
//!
//! 数据来自配置 [tools.policy.hotels]，城市名不区分大小写；未收录的城市返回 NotFound。

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::core::trace::ToolContext;
use crate::tools::{Tool, ToolError};

pub struct CorporateHotelTool {
    hotels: BTreeMap<String, String>,
}

impl CorporateHotelTool {
    pub fn new(hotels: BTreeMap<String, String>) -> Self {
        let hotels = hotels
            .into_iter()
            .map(|(city, guidance)| (city.trim().to_lowercase(), guidance))
            .collect();
        Self { hotels }
    }
}

#[async_trait]
impl Tool for CorporateHotelTool {
    fn name(&self) -> &str {
        "corporate_hotel"
    }

    fn description(&self) -> &str {
        "corporate_hotel(city: str) - corporate-approved hotel guidance. Action Input: the city name, e.g. Hyderabad"
    }

    async fn invoke(&self, arguments: &str, _context: &ToolContext) -> Result<String, ToolError> {
        let city = arguments.trim().trim_matches('"').trim();
        if city.is_empty() {
            return Err(ToolError::invalid_arguments("missing city"));
        }
        self.hotels
            .get(&city.to_lowercase())
            .cloned()
            .ok_or_else(|| ToolError::not_found(format!("no approved hotel for {}", city)))
    }
}
