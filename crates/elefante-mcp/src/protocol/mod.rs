//! JSON-RPC protocol layer: wire types and the stdio transport.

pub mod stdio;
pub mod types;
