//! Tool Registry (C4): named tools invokable from inside a worker's
//! reason-act loop. Each worker is instantiated with a static subset of
//! the registry.

pub mod db;
pub mod document;
pub mod process;
pub mod registry;
pub mod search;
pub mod task_files;

pub use process::{PythonReplTool, ShellTool};
pub use registry::{Tool, ToolRegistry};
