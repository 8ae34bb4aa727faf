//! brief 命令行的稳定退出码

/// 运行完成（包括含有降级步骤的运行）
pub const OK: i32 = 0;
/// 规划失败：没有得到可用的计划
pub const PLANNING_FAILURE: i32 = 1;
/// 综合失败：没有得到简报
pub const SYNTHESIS_FAILURE: i32 = 2;
/// 运行被取消（Ctrl-C）
pub const CANCELLED: i32 = 3;
/// 参数、配置或其它错误
pub const INVALID: i32 = 4;
