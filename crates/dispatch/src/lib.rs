//! Conveyor dispatcher core.
//!
//! The single logical authority over queue state:
//!
//! - [`Dispatcher`] -- task store, worker registry, and per-endpoint FIFO
//!   queues behind one lock; atomic pop-and-claim assignment; completion,
//!   cancellation, and synchronous-wait coordination.
//! - [`sweeper`] -- background eviction of workers whose heartbeats have
//!   gone stale, requeueing their in-flight tasks.
//!
//! Workers pull: they request work when they have free capacity, so the
//! dispatcher never tracks per-worker reachability beyond heartbeats.

pub mod config;
pub mod dispatcher;
pub mod state;
pub mod sweeper;

pub use config::DispatchConfig;
pub use dispatcher::{Dispatcher, EvictionReport, SyncOutcome, TaskFilter, TaskOutcome, TaskPage};
pub use sweeper::start_sweeper;
