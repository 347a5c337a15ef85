//! HTTP handlers, grouped by surface.
//!
//! `tasks`, `stream`, and `workers` serve submitters; `runpod` speaks the
//! worker pull protocol.

pub mod runpod;
pub mod stream;
pub mod tasks;
pub mod workers;
