//! Interactive session layer.
//!
//! [`SessionDriver`] turns one command sent over a raw, pagination-interrupted
//! shell channel into a clean, complete command output. [`transcript`] holds
//! the cleanup primitives shared with the diff engine.

mod driver;
pub mod transcript;

pub use driver::{EchoDetection, SessionDriver, SessionSettings};
