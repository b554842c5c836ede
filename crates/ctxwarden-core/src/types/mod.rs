//! Core types for ctxwarden.

mod message;
mod tool;

pub use message::*;
pub use tool::*;
