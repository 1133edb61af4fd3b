//! Message Bus Adapters - Outbound Publish Transport
//!
//! Concrete `MessageBus` implementations. Redis pub/sub is the only
//! backend today; the connection-policy layer (lazy connect, drop on
//! failure) lives in the core's `Publisher`, so adapters here stay
//! wire-thin.

pub mod redis;

pub use redis::RedisBus;
