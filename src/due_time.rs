use std::time::Duration;

use crate::error::{ExponentialError, InvalidBounds, InvalidFactor};

/// Computes the spacing required after an emission.
///
/// Called exactly once per emitted element, with that element and the
/// interval that was in effect when it was emitted. The returned interval is
/// the minimum time that must pass before the next element is eligible.
///
/// Any `Fn(&T, Duration) -> Duration` closure is a `DueTime<T>`. The provided
/// [`Fixed`], [`Linear`] and [`Exponential`] policies cover the common cases.
///
/// # Examples
///
/// ```rust
/// use lento::DueTime;
/// use std::time::Duration;
///
/// // Double the interval after every emission, starting at 100ms.
/// let backoff = |_: &u32, previous: Duration| (previous * 2).max(Duration::from_millis(100));
///
/// assert_eq!(backoff.next_interval(&7, Duration::ZERO), Duration::from_millis(100));
/// assert_eq!(backoff.next_interval(&7, Duration::from_millis(300)), Duration::from_millis(600));
/// ```
pub trait DueTime<T> {
    /// Returns the interval to enforce after `last` has been emitted.
    fn next_interval(&self, last: &T, previous: Duration) -> Duration;
}

impl<T, F> DueTime<T> for F
where
    F: Fn(&T, Duration) -> Duration,
{
    fn next_interval(&self, last: &T, previous: Duration) -> Duration {
        self(last, previous)
    }
}

/// The same interval after every emission, regardless of the element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fixed(pub Duration);

impl<T> DueTime<T> for Fixed {
    fn next_interval(&self, _last: &T, _previous: Duration) -> Duration {
        self.0
    }
}

/// Grows the interval by a constant step after every emission.
///
/// The first emission (or the first after a reset) yields `initial`; each
/// following one adds `step`, capped at `max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Linear {
    initial: Duration,
    step: Duration,
    max: Duration,
}

impl Linear {
    /// Creates a linear policy.
    ///
    /// Fails if `max` is smaller than `initial`.
    pub fn new(initial: Duration, step: Duration, max: Duration) -> Result<Self, InvalidBounds> {
        if max < initial {
            return Err(InvalidBounds { initial, max });
        }
        Ok(Self { initial, step, max })
    }

    pub fn initial(&self) -> Duration {
        self.initial
    }

    pub fn step(&self) -> Duration {
        self.step
    }

    pub fn max(&self) -> Duration {
        self.max
    }
}

impl<T> DueTime<T> for Linear {
    fn next_interval(&self, _last: &T, previous: Duration) -> Duration {
        if previous < self.initial {
            self.initial
        } else {
            previous.saturating_add(self.step).min(self.max)
        }
    }
}

/// Multiplies the interval by a constant factor after every emission.
///
/// The first emission (or the first after a reset) yields `initial`; each
/// following one multiplies the previous interval by `factor`, capped at `max`.
///
/// # Examples
///
/// ```rust
/// use lento::{DueTime, Exponential};
/// use std::time::Duration;
///
/// let backoff = Exponential::new(Duration::from_millis(100), 2.0, Duration::from_secs(1)).unwrap();
///
/// let mut interval = Duration::ZERO;
/// let mut seen = vec![];
/// for _ in 0..5 {
///     interval = backoff.next_interval(&(), interval);
///     seen.push(interval.as_millis());
/// }
/// assert_eq!(seen, vec![100, 200, 400, 800, 1000]);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Exponential {
    initial: Duration,
    factor: f64,
    max: Duration,
}

impl Exponential {
    /// Creates an exponential policy.
    ///
    /// Fails if `factor` is not a finite number `>= 1.0`, or if `max` is
    /// smaller than `initial`.
    pub fn new(initial: Duration, factor: f64, max: Duration) -> Result<Self, ExponentialError> {
        if !factor.is_finite() || factor < 1.0 {
            return Err(ExponentialError::Factor(InvalidFactor { factor }));
        }
        if max < initial {
            return Err(ExponentialError::Bounds(InvalidBounds { initial, max }));
        }
        Ok(Self {
            initial,
            factor,
            max,
        })
    }

    pub fn initial(&self) -> Duration {
        self.initial
    }

    pub fn factor(&self) -> f64 {
        self.factor
    }

    pub fn max(&self) -> Duration {
        self.max
    }
}

impl<T> DueTime<T> for Exponential {
    fn next_interval(&self, _last: &T, previous: Duration) -> Duration {
        if previous < self.initial {
            return self.initial;
        }
        // scaled in whole nanoseconds so integral factors stay exact
        let next = (previous.as_nanos() as f64 * self.factor).round();
        if next >= self.max.as_nanos() as f64 {
            self.max
        } else {
            Duration::from_nanos(next as u64)
        }
    }
}
