//! Built-in gateway API implementations

pub mod memory;

pub use memory::MemoryGateway;
