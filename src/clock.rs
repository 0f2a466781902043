use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Trait for monotonic clock implementations used by pacers.
///
/// Implementations must provide monotonic time that never goes backwards.
/// Time is measured as the [`Duration`] elapsed since an arbitrary origin.
pub trait Clock {
    /// Returns the time elapsed since the clock's origin.
    ///
    /// The returned value must be monotonic (never decrease). Pacing only ever
    /// compares readings of the same clock, so the origin itself is irrelevant.
    fn now(&self) -> Duration;
}

/// Standard clock implementation using [`std::time::Instant`].
///
/// This provides high precision timing but may be slower than alternatives.
/// For high-performance scenarios, consider using `FastClock`.
///
/// Note that the stream adapters arm their flush timers on tokio's clock. Use
/// `TokioClock` with them so both agree, notably under paused time.
///
/// # Examples
///
/// ```rust
/// use lento::{Fixed, Pacer, StdClock};
/// use std::time::Duration;
///
/// let pacer = Pacer::<u32, _, _>::with_clock(
///     Fixed(Duration::from_millis(100)),
///     StdClock::default(),
/// );
/// assert_eq!(pacer.interval(), Duration::ZERO);
/// ```
#[derive(Clone)]
pub struct StdClock {
    origin: std::time::Instant,
}

impl Default for StdClock {
    fn default() -> Self {
        Self {
            origin: std::time::Instant::now(),
        }
    }
}

impl Clock for StdClock {
    fn now(&self) -> Duration {
        std::time::Instant::now().duration_since(self.origin)
    }
}

/// High-precision clock implementation using the `quanta` crate.
///
/// Requires the "quanta" feature to be enabled.
#[cfg(feature = "quanta")]
#[derive(Clone)]
pub struct QuantaClock {
    clock: quanta::Clock,
    origin: quanta::Instant,
}

#[cfg(feature = "quanta")]
impl Default for QuantaClock {
    fn default() -> Self {
        Self::new(quanta::Clock::new())
    }
}

#[cfg(feature = "quanta")]
impl QuantaClock {
    /// Creates a new `QuantaClock` from a `quanta::Clock` instance.
    pub fn new(clock: quanta::Clock) -> Self {
        let origin = clock.now();
        Self { clock, origin }
    }
}

#[cfg(feature = "quanta")]
impl Clock for QuantaClock {
    fn now(&self) -> Duration {
        self.clock.now().duration_since(self.origin)
    }
}

/// Tokio-compatible clock implementation using [`tokio::time::Instant`].
///
/// This is the clock to use with the stream adapters: it follows tokio's
/// time, including `tokio::time::pause` and `advance` in tests. Requires the
/// "tokio" feature.
///
/// # Examples
///
/// ```rust
/// # #[cfg(feature = "tokio")]
/// # {
/// use lento::{Fixed, Pacer, TokioClock};
/// use std::time::Duration;
///
/// let pacer = Pacer::<u32, _, _>::with_clock(
///     Fixed(Duration::from_millis(250)),
///     TokioClock::default(),
/// );
/// # }
/// ```
#[cfg(feature = "tokio")]
#[derive(Clone)]
pub struct TokioClock {
    origin: tokio::time::Instant,
}

#[cfg(feature = "tokio")]
impl Default for TokioClock {
    fn default() -> Self {
        Self {
            origin: tokio::time::Instant::now(),
        }
    }
}

#[cfg(feature = "tokio")]
impl Clock for TokioClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// High-performance clock using quanta's coarse timing.
///
/// Trades precision for speed; the precision depends on how frequently
/// quanta's upkeep thread runs. Requires the "quanta" feature.
#[cfg(feature = "quanta")]
#[derive(Clone)]
pub struct FastClock {
    clock: quanta::Clock,
    origin: quanta::Instant,
}

#[cfg(feature = "quanta")]
impl Default for FastClock {
    fn default() -> Self {
        Self::new(quanta::Clock::new())
    }
}

#[cfg(feature = "quanta")]
impl FastClock {
    /// Creates a new `FastClock` from a `quanta::Clock` instance.
    ///
    /// **Important**: Ensure the clock's upkeep thread is running, otherwise
    /// the pacer will not observe clock changes and every element after the
    /// first will look suppressed.
    pub fn new(clock: quanta::Clock) -> Self {
        let origin = clock.recent();
        Self { clock, origin }
    }
}

#[cfg(feature = "quanta")]
impl Clock for FastClock {
    fn now(&self) -> Duration {
        self.clock.recent().duration_since(self.origin)
    }
}

/// Manual clock implementation for testing and simulation.
///
/// Allows precise control over time progression, making it ideal for unit
/// tests and deterministic simulations of pacing behavior.
///
/// # Examples
///
/// ```rust
/// use lento::{Fixed, ManualClock, Pacer, Verdict};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// let clock = Arc::new(ManualClock::default());
/// let mut pacer = Pacer::with_clock(Fixed(Duration::from_secs(1)), Arc::clone(&clock));
///
/// assert!(matches!(pacer.on_next(1), Verdict::Emit(1)));
/// pacer.emitted();
/// assert!(matches!(pacer.on_next(2), Verdict::Dropped(2)));
///
/// clock.advance(Duration::from_secs(1));
/// assert!(matches!(pacer.on_next(3), Verdict::Emit(3)));
/// ```
pub struct ManualClock {
    pub now: Mutex<Duration>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(Duration::ZERO)
    }
}

impl ManualClock {
    /// Creates a new manual clock starting at the specified time.
    pub fn new(now: Duration) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    /// Sets the current time to the specified value.
    pub fn set(&self, now: Duration) {
        let mut guard = self.now.lock().unwrap();
        *guard = now;
    }

    /// Advances the current time by the specified duration.
    pub fn advance(&self, delta: Duration) {
        let mut guard = self.now.lock().unwrap();
        *guard += delta;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        *self.now.lock().unwrap()
    }
}

impl Clock for &ManualClock {
    fn now(&self) -> Duration {
        *self.now.lock().unwrap()
    }
}

impl Clock for Arc<ManualClock> {
    fn now(&self) -> Duration {
        *self.now.lock().unwrap()
    }
}
