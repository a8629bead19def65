//! Foundation types for Capsa.
//!
//! This crate provides the identity and temporal primitives used throughout
//! the capsule provenance system. Every other Capsa crate depends on
//! `capsa-types`.
//!
//! # Key Types
//!
//! - [`Digest`] — 64-hex-char SHA-256 content digest
//! - [`StreamingHasher`] — chunked hashing for arbitrarily large inputs
//! - [`Clock`] — injectable time source ([`SystemClock`], [`FixedClock`])

pub mod clock;
pub mod digest;
pub mod error;
pub mod hasher;

pub use clock::{format_compact, format_timestamp, Clock, FixedClock, SystemClock};
pub use digest::Digest;
pub use error::TypeError;
pub use hasher::StreamingHasher;
