//! Raspberry Pi pump controller

pub mod client;

pub use client::{PiClient, PiError, DEFAULT_PUMP_DURATION_SECS};
