//! Standard activity library
//!
//! Collection of built-in activity executors for common operations

mod debug;
mod http;
mod message;
mod resource;
mod shared;
mod time;
mod transform;

pub use debug::{DebugConfig, DebugExecutor};
pub use http::{ExecuteRequestConfig, ExecuteRequestExecutor};
pub use message::{SendMessageConfig, SendMessageExecutor, StreamTarget};
pub use resource::{SaveResourceConfig, SaveResourceExecutor};
pub use shared::{GetSharedDataConfig, GetSharedDataExecutor, PutSharedDataConfig, PutSharedDataExecutor};
pub use time::{DelayConfig, DelayExecutor};
pub use transform::{SetVariablesConfig, SetVariablesExecutor};

use flowruntime::{ExecutorRegistry, TypedExecutorFactory};
use std::sync::Arc;

/// Register all standard activity kinds with a registry
pub fn register_all(registry: &mut ExecutorRegistry) {
    registry.register(Arc::new(
        TypedExecutorFactory::<DebugExecutor>::new("debug")
            .shared()
            .describe("Logs a message for debugging", "debug"),
    ));
    registry.register(Arc::new(
        TypedExecutorFactory::<SendMessageExecutor>::new("send-message")
            .shared()
            .describe("Sends a message to a stream", "messaging"),
    ));
    registry.register(Arc::new(
        TypedExecutorFactory::<SetVariablesExecutor>::new("set-variables")
            .shared()
            .describe("Sets workflow variables", "transform"),
    ));
    registry.register(Arc::new(
        TypedExecutorFactory::<ExecuteRequestExecutor>::new("execute-request")
            .shared()
            .describe("Makes HTTP requests", "http"),
    ));
    registry.register(Arc::new(
        TypedExecutorFactory::<DelayExecutor>::new("delay")
            .describe("Delays execution for a number of milliseconds", "time"),
    ));
    registry.register(Arc::new(
        TypedExecutorFactory::<SaveResourceExecutor>::new("save-resource")
            .describe("Stores text as a workflow resource", "resource"),
    ));
    registry.register(Arc::new(
        TypedExecutorFactory::<PutSharedDataExecutor>::new("put-shared-data")
            .describe("Writes an entry of the shared data store", "data"),
    ));
    registry.register(Arc::new(
        TypedExecutorFactory::<GetSharedDataExecutor>::new("get-shared-data")
            .describe("Reads an entry of the shared data store", "data"),
    ));
}
