//! Memory-side batching of samples between flushes.

pub mod memory_buffer;
