//! Streaming-response reassembly.

pub mod accumulator;

pub use accumulator::StreamAccumulator;
