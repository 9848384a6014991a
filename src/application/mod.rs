//! Application layer: the payment session controller and the two timers it
//! coordinates.
//!
//! The controller runs as a single task that owns all session state and
//! reacts to operator inputs, initiation results, poll reports and idle
//! signals delivered through `tokio` channels.

pub mod controller;
pub mod inactivity;
pub mod poller;
