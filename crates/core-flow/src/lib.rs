//! Pipeline driver: options loading and the fixed pass ordering for the
//! single-threaded and multi-threaded generation flows.

mod flows;
mod options;

pub use flows::{multi_threaded_flow, single_threaded_flow, FlowReport};
pub use options::{load_options, DumpPoints, FlowConfig, FlowOptions};
