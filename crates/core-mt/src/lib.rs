//! Multi-threading transforms: partition-crossing FIFO insertion, delay
//! absorption and FIFO merging, and the inter-thread deadlock check.

pub mod absorption;
pub mod deadlock;
pub mod fifo_insert;
