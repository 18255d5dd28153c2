//! Code emission.
//!
//! Consumes the scheduled design and produces C sources: one flat function
//! for the single-threaded reference path, and per-partition thread
//! functions with FIFO plumbing, boundary threads, benchmark drivers, and a
//! Makefile for the multi-threaded path.

mod files;
mod helpers;
mod multi;
mod single;

pub use files::FileSink;
pub use helpers::{emit_partition_body, EmittedFile};
pub use multi::{emit_multi_threaded, IoVariant, MultiThreadEmitOptions};
pub use single::emit_single_threaded;
