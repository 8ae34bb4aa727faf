//! ReAct 输出解析：纯函数，不依赖模型调用
//!
//! 识别行首标记 `Thought:` / `Action:` / `Action Input:` / `Final Answer:`（区分大小写，允许行首缩进）。
//! 优先级：非空 Final Answer > Action + Action Input > 单独的 Thought > 无法解析。

use crate::core::trace::ToolCall;

/// 一次 THINKING 输出的解析结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepDirective {
    /// 只有思考，没有动作也没有最终答案
    Thought(String),
    /// 请求调用工具
    ActionRequest {
        thought: Option<String>,
        call: ToolCall,
    },
    /// 本步最终答案
    FinalAnswer {
        thought: Option<String>,
        answer: String,
    },
    /// 没有任何可识别的标记（保留原文）
    Unparseable(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Marker {
    Thought,
    Action,
    ActionInput,
    FinalAnswer,
}

const MARKERS: [(&str, Marker); 4] = [
    ("Final Answer:", Marker::FinalAnswer),
    ("Action Input:", Marker::ActionInput),
    ("Action:", Marker::Action),
    ("Thought:", Marker::Thought),
];

/// `Observation:` 不是模型应产出的标记，但出现时要截断 Thought 续行
const OBSERVATION: &str = "Observation:";

fn marker_of(line: &str) -> Option<(Marker, &str)> {
    let line = line.trim_start();
    MARKERS
        .iter()
        .find_map(|(prefix, m)| line.strip_prefix(prefix).map(|rest| (*m, rest)))
}

fn non_empty(s: String) -> Option<String> {
    let t = s.trim();
    if t.is_empty() {
        None
    } else {
        Some(t.to_string())
    }
}

/// 解析一次模型输出
pub fn parse_step_output(text: &str) -> StepDirective {
    let lines: Vec<&str> = text.lines().collect();

    let mut thoughts: Vec<String> = Vec::new();
    let mut action: Option<String> = None;
    let mut action_input: Option<String> = None;
    let mut final_at: Option<usize> = None;
    // 当前是否处于 Thought 续行中
    let mut in_thought = false;

    for (i, line) in lines.iter().enumerate() {
        match marker_of(line) {
            Some((Marker::FinalAnswer, _)) => {
                final_at = Some(i);
                break;
            }
            Some((Marker::Thought, rest)) => {
                if action_input.is_some() {
                    break;
                }
                thoughts.push(rest.trim().to_string());
                in_thought = true;
            }
            Some((Marker::Action, rest)) => {
                in_thought = false;
                if action.is_none() {
                    action = Some(rest.trim().to_string());
                }
            }
            Some((Marker::ActionInput, rest)) => {
                in_thought = false;
                if action.is_some() && action_input.is_none() {
                    action_input = Some(rest.trim().to_string());
                }
            }
            None => {
                if line.trim_start().starts_with(OBSERVATION) {
                    in_thought = false;
                } else if in_thought {
                    if let Some(last) = thoughts.last_mut() {
                        if !line.trim().is_empty() {
                            if !last.is_empty() {
                                last.push('\n');
                            }
                            last.push_str(line.trim());
                        }
                    }
                }
            }
        }
    }

    let thought = non_empty(thoughts.join("\n"));

    if let Some(i) = final_at {
        let first = marker_of(lines[i]).map(|(_, rest)| rest).unwrap_or("");
        let mut answer = first.trim().to_string();
        for rest in &lines[i + 1..] {
            answer.push('\n');
            answer.push_str(rest);
        }
        if let Some(answer) = non_empty(answer) {
            return StepDirective::FinalAnswer { thought, answer };
        }
    }
    // 空的 Final Answer 不算答案，继续看是否有完整的 Action 对
    if let (Some(tool), Some(arguments)) = (action, action_input) {
        if !tool.is_empty() {
            return StepDirective::ActionRequest {
                thought,
                call: ToolCall {
                    tool_name: tool,
                    arguments,
                },
            };
        }
    }

    match thought {
        Some(t) => StepDirective::Thought(t),
        None => StepDirective::Unparseable(text.trim().to_string()),
    }
}
