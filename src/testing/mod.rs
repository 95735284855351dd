//! Testing utilities and mock implementations
//!
//! Mock collaborators for exercising the supervisor and dispatcher without a
//! wireless interface, a broker or a printer. Every mock is a cheap clone
//! over shared state, so a test can keep a handle while the supervisor owns
//! the other.

pub mod mocks;

pub use mocks::*;
