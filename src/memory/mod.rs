//! Backing memory handed to mempools

pub mod arena;

pub use arena::Arena;
