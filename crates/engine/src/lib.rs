//! The orchestration kernel: Event Bus, LLM Gateway glue, Worker Runtime,
//! Graph Engine, and the Orchestration Facade that ties them together.

pub mod bus;
pub mod cancel;
pub mod facade;
pub mod graph;
pub mod json_clean;
pub mod nodes;
pub mod prompt;
pub mod roster;
pub mod title_adapter;
pub mod worker;

pub use bus::{EventBus, EventReceiver};
pub use cancel::CancelToken;
pub use facade::Engine;
pub use roster::WorkerRoster;
pub use worker::{Worker, WorkerOutcome};
