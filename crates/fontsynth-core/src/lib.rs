//! Shared building blocks for the fontsynth crates.
//!
//! - [`SynthConfig`]: engine configuration with validation
//! - [`AtomicFloat`], [`AtomicFlag`], [`AtomicCounter`]: cache-line aligned atomics
//!   shared between the control and render threads
//! - [`units`]: SoundFont unit conversions (timecents, absolute cents, centibels)

pub mod error;
pub use error::{Error, Result};

mod config;
pub use config::{Interpolation, SynthConfig};

mod lockfree;
pub use lockfree::{AtomicCounter, AtomicFlag, AtomicFloat};

pub mod units;

pub use std::sync::atomic::Ordering;
pub use std::sync::Arc;
