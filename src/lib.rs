//! Ratekeeper - In-process Admission Control
//!
//! This crate implements rate limiters meant to sit in front of a protected
//! resource inside a server or client. Each limiter makes an immediate
//! admit/reject decision per request using either a fixed-window counter or
//! a leaky-bucket accumulator. State is in-memory and local to one process.

pub mod config;
pub mod error;
pub mod ratelimit;
