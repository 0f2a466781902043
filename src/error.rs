use std::fmt::{Debug, Display, Formatter};
use std::time::Duration;

/// The growth factor of an exponential due-time policy is not a finite
/// number greater than or equal to one.
pub struct InvalidFactor {
    pub(crate) factor: f64,
}

/// The upper bound of a due-time policy is smaller than its initial interval.
pub struct InvalidBounds {
    pub(crate) initial: Duration,
    pub(crate) max: Duration,
}

impl InvalidFactor {
    /// The rejected factor.
    pub fn factor(&self) -> f64 {
        self.factor
    }
}

impl InvalidBounds {
    /// The requested initial interval.
    pub fn initial(&self) -> Duration {
        self.initial
    }

    /// The requested upper bound.
    pub fn max(&self) -> Duration {
        self.max
    }
}

impl Debug for InvalidFactor {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid growth factor {:?}", self.factor)
    }
}

impl Display for InvalidFactor {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "growth factor must be a finite number >= 1, got {}",
            self.factor
        )
    }
}

impl Debug for InvalidBounds {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "invalid bounds; initial={:?}, max={:?}",
            self.initial, self.max
        )
    }
}

impl Display for InvalidBounds {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "maximum interval {:?} is smaller than the initial interval {:?}",
            self.max, self.initial
        )
    }
}

impl std::error::Error for InvalidFactor {}
impl std::error::Error for InvalidBounds {}

/// Why an [`Exponential`](crate::Exponential) policy could not be constructed.
#[derive(Debug)]
pub enum ExponentialError {
    Factor(InvalidFactor),
    Bounds(InvalidBounds),
}

impl Display for ExponentialError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ExponentialError::Factor(e) => Display::fmt(e, f),
            ExponentialError::Bounds(e) => Display::fmt(e, f),
        }
    }
}

impl std::error::Error for ExponentialError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ExponentialError::Factor(e) => Some(e),
            ExponentialError::Bounds(e) => Some(e),
        }
    }
}
