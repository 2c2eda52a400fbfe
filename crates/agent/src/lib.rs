//! The agentic tier's reasoning loop — Functions.do's tier-3 executor.
//!
//! A function tagged `agentic` hands the dispatcher a goal, a provider, and a
//! tool registry; this crate runs the model + tool-call round trips until the
//! model returns a plain text answer, a step budget is hit, or execution
//! fails. It implements [`functionsdo_dispatch::agentic::AgenticRunner`] so
//! the dispatcher never depends on this crate directly.

pub mod loop_runner;

pub use loop_runner::AgentLoop;
