//! Shared value types: conversation transcript, tool descriptors, cancellation

mod message;
mod tool;
mod cancellation;

pub use message::{ChatMessage, MessageRole, Transcript};
pub use tool::{ToolDescriptor, ToolCall, ToolOutput};
pub use cancellation::CancellationToken;
