// Library exports for the binary and integration tests

pub mod bridge;
pub mod config;
pub mod dom;

pub use bridge::{BridgeError, BridgeSession, MemoryChannel, StdioChannel};
pub use config::BridgeConfig;
pub use dom::Document;
