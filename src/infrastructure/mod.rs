//! Gateway adapters: the REST client used in production and a scriptable
//! in-memory gateway.

pub mod http;
pub mod in_memory;
