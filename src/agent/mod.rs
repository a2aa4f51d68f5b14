//! Agent 模式：Planner 与有界工具循环

pub mod loop_;
pub mod planner;

pub use loop_::{agent_loop, AgentOutcome};
pub use planner::{parse_model_output, tool_instructions, Planner, PlannerOutput, ToolCallRequest};
