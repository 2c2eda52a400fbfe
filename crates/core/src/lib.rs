//! # Functions.do Core
//!
//! Domain types, traits, and error definitions for the Functions.do function
//! execution gateway. This crate has **zero HTTP-framework dependencies** —
//! it defines the domain model that every other crate implements against.
//!
//! ## Design Philosophy
//!
//! Every subsystem collaborator (LLM provider, tool) is a trait here.
//! Implementations live in their respective crates. Dispatch over the four
//! function tiers is a tagged enum (`model::FunctionKind`) matched in the
//! dispatcher, not a class hierarchy.

pub mod envelope;
pub mod error;
pub mod ids;
pub mod message;
pub mod model;
pub mod provider;
pub mod route;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use envelope::{ErrorBody, ErrorEnvelope};
pub use error::{Error, ErrorCode, ProviderError, Result, StorageError, TaskError, ToolError};
pub use ids::{FunctionId, FunctionIdError};
pub use message::{Conversation, ConversationId, Message, MessageToolCall, Role};
pub use model::{
    CascadeStep, ErrorHandling, FunctionCode, FunctionKind, FunctionMetadata, HumanUiForm,
    InvocationOptions, RollbackRecord, ToolImplementation, ToolSpec,
};
pub use provider::{Provider, ProviderRequest, ProviderResponse, StreamChunk};
pub use route::{ApiVersionSource, AuthContext, RouteContext};
pub use tool::{Tool, ToolCall, ToolRegistry, ToolResult};
