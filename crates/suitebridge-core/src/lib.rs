//! Core types: time windows, busy/free intervals, free-slot search, tracing

pub mod slots;
pub mod time;
pub mod tracing;

pub use slots::{BusyInterval, FreeInterval, find_free_slots};
pub use time::{EventTime, TimeWindow};
pub use tracing::{TracingConfig, TracingError, TracingOutputFormat, init_tracing};
