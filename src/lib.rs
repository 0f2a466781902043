#![doc = include_str!("../README.md")]
//!
//! # Core Components
//!
//! - [`Pacer`] - The pacing state machine, independent of any runtime
//! - [`DueTime`] - Policies computing the next interval ([`Fixed`], [`Linear`], [`Exponential`] or a closure)
//! - [`Clock`] trait and implementations for time sources
//! - Stream adapters in [`futures`] (requires the "async" feature)
//!
//! # Quick Start
//!
//! ```rust
//! use lento::{Fixed, ManualClock, Pacer, Verdict};
//! use std::time::Duration;
//!
//! let clock = ManualClock::new(Duration::ZERO);
//! let mut pacer = Pacer::with_clock(Fixed(Duration::from_millis(100)), &clock);
//!
//! // The first element always passes
//! assert!(matches!(pacer.on_next("a"), Verdict::Emit("a")));
//! // Record the delivery; otherwise it is recorded on the next call
//! pacer.emitted();
//!
//! // Too early: dropped, since only the leading edge is kept by default
//! clock.advance(Duration::from_millis(40));
//! assert!(matches!(pacer.on_next("b"), Verdict::Dropped("b")));
//!
//! clock.advance(Duration::from_millis(60));
//! assert!(matches!(pacer.on_next("c"), Verdict::Emit("c")));
//! ```

mod clock;
mod due_time;
mod error;
#[cfg(feature = "async")]
pub mod futures;
mod pacer;

#[cfg(feature = "tokio")]
pub use clock::TokioClock;
pub use clock::{Clock, ManualClock, StdClock};
#[cfg(feature = "quanta")]
pub use clock::{FastClock, QuantaClock};
pub use due_time::{DueTime, Exponential, Fixed, Linear};
pub use error::*;
#[cfg(feature = "async")]
pub use futures::{SmartThrottleExt, TrySmartThrottleExt};
pub use pacer::{Flush, FlushTicket, Pacer, Verdict};
