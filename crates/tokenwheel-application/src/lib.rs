//! Application layer for Token Wheel.
//!
//! Wires the oracle provider, the categorizer and the session store together
//! into the operations the transport exposes, and runs the expiry sweep.

pub mod dto;
pub mod wheel_usecase;

pub use wheel_usecase::TokenWheelUseCase;
