mod gate;
mod throttle;
mod timer;
mod try_throttle;

pub use throttle::SmartThrottle;
pub use try_throttle::TrySmartThrottle;

use futures::stream::{self, Stream, TryStream};

use crate::{Clock, DueTime, Pacer};

pub trait SmartThrottleExt: Stream + Sized {
    /// Paces this stream with `pacer`. Pacing never resets.
    fn smart_throttle<F, C>(self, pacer: Pacer<Self::Item, F, C>) -> SmartThrottle<Self, stream::Empty<()>, F, C>
    where
        F: DueTime<Self::Item>,
        C: Clock,
    {
        SmartThrottle::new(self, pacer, stream::empty())
    }

    /// Paces this stream with `pacer`, resetting the pacing state whenever
    /// `reset` yields.
    fn smart_throttle_with_reset<R, F, C>(self, pacer: Pacer<Self::Item, F, C>, reset: R) -> SmartThrottle<Self, R, F, C>
    where
        R: Stream,
        F: DueTime<Self::Item>,
        C: Clock,
    {
        SmartThrottle::new(self, pacer, reset)
    }
}

impl<S: Stream> SmartThrottleExt for S {}

pub trait TrySmartThrottleExt: TryStream + Sized {
    fn try_smart_throttle<F, C>(self, pacer: Pacer<Self::Ok, F, C>) -> TrySmartThrottle<Self, stream::Empty<()>, F, C>
    where
        F: DueTime<Self::Ok>,
        C: Clock,
    {
        TrySmartThrottle::new(self, pacer, stream::empty())
    }

    fn try_smart_throttle_with_reset<R, F, C>(
        self,
        pacer: Pacer<Self::Ok, F, C>,
        reset: R,
    ) -> TrySmartThrottle<Self, R, F, C>
    where
        R: Stream,
        F: DueTime<Self::Ok>,
        C: Clock,
    {
        TrySmartThrottle::new(self, pacer, reset)
    }
}

impl<S: TryStream> TrySmartThrottleExt for S {}
