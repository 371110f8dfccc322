//! Language model implementations.

pub mod arpa;
pub mod zero;

pub use arpa::{ArpaLm, ArpaState};
pub use zero::{ZeroLm, ZeroLmState};
