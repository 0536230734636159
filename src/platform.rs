//! Dispatch of platform operations on behalf of connected users.

pub mod api;
pub mod client;
pub mod retry;

pub use api::*;
pub use client::*;
pub use retry::*;
