//! Provider Adapters - Exchange REST/WebSocket Clients
//!
//! Profile-driven implementation of the `DataProvider` port. Each
//! supported exchange is described by a static `ProviderProfile`
//! declaring its REST endpoint per data kind and its stream channel per
//! stream kind; the generic signed client does the rest. Capability is
//! therefore declared configuration: a kind missing from a profile is
//! simply never dispatched.
//!
//! Modules:
//! - `profiles`: static per-exchange endpoint/channel tables
//! - `rest`: signed REST client (HMAC-SHA256, retry, concurrency cap)
//! - `stream`: auto-reconnecting WebSocket demux
//! - `exchange`: the combined `DataProvider` + factory

pub mod exchange;
pub mod profiles;
pub mod rest;
pub mod stream;

pub use exchange::{ExchangeProvider, ExchangeProviderRegistry};
pub use profiles::ProviderProfile;
