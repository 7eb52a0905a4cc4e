//! Registry client
//!
//! Wire-level XML-RPC client for the master's parameter and state
//! methods, plus the typed value codec.

mod client;
mod value;

pub use client::RegistryClient;
pub use value::RpcValue;
