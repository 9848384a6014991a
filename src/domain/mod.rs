//! Domain types for the payment terminal: amount entry, payment sessions and
//! the gateway port the application layer talks through.

pub mod amount;
pub mod payment;
pub mod ports;
