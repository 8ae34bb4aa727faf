//! 工具箱：注册表与调度边界，以及事实查询、天气、差旅政策三个后端

pub mod policy;
pub mod registry;
pub mod weather;
pub mod wikipedia;

pub use policy::CorporateHotelTool;
pub use registry::{Tool, ToolError, ToolErrorKind, ToolRegistry};
pub use weather::{WeatherTool, COORDS_KEY};
pub use wikipedia::WikipediaTool;
