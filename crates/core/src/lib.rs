//! Conveyor domain model.
//!
//! Shared types for the dispatcher: the task record and its status state
//! machine, the worker record, endpoint statistics, and the dispatch error
//! taxonomy. This crate has no internal dependencies so every other crate
//! in the workspace can use it.

pub mod error;
pub mod task;
pub mod types;
pub mod worker;

pub use error::DispatchError;
pub use task::{Task, TaskStatus};
pub use worker::{EndpointStats, Worker, WorkerStatus};
