//! Conveyor task event infrastructure.
//!
//! Provides [`TaskEventBus`], the in-process publish/subscribe hub for
//! per-task events: streamed partial-output chunks and terminal
//! transitions. Synchronous submission waits on it, and the streaming
//! endpoint serves it to clients.

pub mod bus;

pub use bus::{TaskEvent, TaskEventBus, TaskEventKind};
