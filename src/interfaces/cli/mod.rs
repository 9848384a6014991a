//! Line-oriented operator console for driving a terminal from stdin.

pub mod console;
