//! The one-shot timer used for trailing flushes.
//!
//! Storing a new [`Sleep`] in place of an old one drops, and thereby cancels,
//! the old timer.

#[cfg(feature = "tokio-hrtime")]
pub(crate) use tokio_hrtime::{Sleep, sleep};

#[cfg(all(feature = "async", not(feature = "tokio-hrtime")))]
pub(crate) use tokio::time::{Sleep, sleep};
