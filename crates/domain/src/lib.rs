pub mod capability;
pub mod config;
pub mod error;
pub mod event;
pub mod message;
pub mod state;
pub mod stream;
pub mod task;
pub mod trace;
pub mod worker;

pub use capability::{LlmCapabilities, ModelRole, ToolSupport};
pub use error::{Error, Result};
pub use event::{Event, MessageDelta, Step, StepInfo};
pub use message::{ContentPart, Message, MessageContent, Role, ToolCall, ToolDefinition};
pub use state::{Options, Plan, SessionState, SummaryRef};
pub use stream::{BoxStream, Chunk, Usage};
pub use task::TaskId;
pub use worker::{RouteDecision, WorkerName};
